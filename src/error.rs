// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{AuthError, IssuanceError};
use crate::crypto::EnvelopeError;
use crate::gateway::GatewayError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// A dependency failed. `detail` is logged, the client gets `message`.
    pub fn infrastructure(message: impl Into<String>, detail: impl Display) -> Self {
        let message = message.into();
        tracing::error!(error = %detail, "{message}");
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    /// Serializing or sealing a response failed.
    pub fn encoding(detail: impl Display) -> Self {
        tracing::error!(error = %detail, "failed to encode response");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "encoding_error",
            "Failed to encode response",
        )
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        if let AuthError::InternalError(detail) = &e {
            tracing::error!(error = %detail, "authentication internal error");
        }
        Self::new(e.status_code(), e.error_code(), e.public_message())
    }
}

impl From<IssuanceError> for ApiError {
    fn from(e: IssuanceError) -> Self {
        match e {
            IssuanceError::UnknownKey => Self::unauthenticated("Invalid X-Token").with_code("invalid_key"),
            IssuanceError::Banned => {
                Self::forbidden("This key has been banned due to security policy violations.").with_code("key_banned")
            }
            IssuanceError::ProvinceMismatch => Self::forbidden(
                "Security risk: Access from a different province is not allowed. This key has been banned.",
            )
            .with_code("province_mismatch"),
            IssuanceError::CityLimitExceeded => Self::forbidden(
                "Security risk: Access from more than 2 cities is not allowed. This key has been banned.",
            )
            .with_code("city_limit_exceeded"),
            IssuanceError::Store(e) => Self::infrastructure("Credential store unavailable", e),
            IssuanceError::Geo(e) => Self::infrastructure("IP geolocation failed", e),
            e @ IssuanceError::Contention => Self::infrastructure("Credential store busy, try again", e),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::UnknownTarget(_) => Self::not_found("Unknown target").with_code("unknown_target"),
            GatewayError::UnknownParam { kind: "module", .. } => {
                Self::not_found("Unknown module parameter").with_code("unknown_parameter")
            }
            GatewayError::UnknownParam { .. } => Self::not_found("Unknown round parameter").with_code("unknown_parameter"),
            e @ GatewayError::MissingParam { .. } => Self::bad_request(capitalize(&e.to_string())),
            GatewayError::Rounds(e) => Self::infrastructure("Failed to process round data", e),
        }
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(e: EnvelopeError) -> Self {
        Self::encoding(e)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let infra = ApiError::infrastructure("Store down", "disk on fire");
        assert_eq!(infra.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(infra.message, "Store down");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"bad_request"}"#);
    }

    #[test]
    fn issuance_errors_map_to_status() {
        assert_eq!(ApiError::from(IssuanceError::UnknownKey).status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(IssuanceError::Banned).status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(IssuanceError::ProvinceMismatch).status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(IssuanceError::CityLimitExceeded).status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(IssuanceError::Contention).status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn gateway_errors_map_to_status() {
        let unknown = ApiError::from(GatewayError::UnknownTarget("zz".into()));
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        assert!(!unknown.message.contains("zz"));

        let missing = ApiError::from(GatewayError::MissingParam {
            target: "g7",
            field: "params",
        });
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.message, "Missing 'params' for target 'g7'");
    }

    #[test]
    fn infrastructure_detail_stays_out_of_the_body() {
        let err = ApiError::from(IssuanceError::Geo(crate::geo::GeoError::Transport(
            "connect to 10.9.8.7 refused".into(),
        )));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("10.9.8.7"));
    }
}
