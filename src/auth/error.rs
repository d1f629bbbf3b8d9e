// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Covers both request-integrity checks and bearer session verification.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// `X-Timestamp` or `X-Signature` missing
    MissingIntegrityHeaders,
    /// `X-Timestamp` is not an integer
    InvalidTimestamp,
    /// `X-Timestamp` outside the allowed skew
    StaleTimestamp,
    /// Request signature does not match
    SignatureMismatch,
    /// Internal error (detail is logged, never returned)
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingIntegrityHeaders => "missing_integrity_headers",
            AuthError::InvalidTimestamp => "invalid_timestamp",
            AuthError::StaleTimestamp => "stale_timestamp",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::MissingIntegrityHeaders => StatusCode::UNAUTHORIZED,
            AuthError::InvalidTimestamp | AuthError::StaleTimestamp | AuthError::SignatureMismatch => {
                StatusCode::FORBIDDEN
            }
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InternalError(_) => "Internal authentication error".to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Authorization header format must be Bearer {{token}}")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::MissingIntegrityHeaders => write!(f, "Missing required integrity headers"),
            AuthError::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            AuthError::StaleTimestamp => write!(f, "Timestamp is out of date"),
            AuthError::SignatureMismatch => write!(f, "Invalid signature"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InternalError(detail) = &self {
            tracing::error!(error = %detail, "authentication internal error");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[test]
    fn integrity_failures_split_between_401_and_403() {
        assert_eq!(AuthError::MissingIntegrityHeaders.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::StaleTimestamp.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::SignatureMismatch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::InvalidTimestamp.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_error_detail_is_not_returned() {
        let response = AuthError::InternalError("connect info missing for 10.1.2.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(!body.contains("10.1.2.3"));
    }
}
