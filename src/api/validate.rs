// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session issuance endpoint.

use axum::{extract::State, http::HeaderMap, Json};
use tracing::info;

use crate::auth::{issuance, ClientIp, IssuanceError};
use crate::error::ApiError;
use crate::models::TokenResponse;
use crate::state::AppState;
use crate::telemetry::redact;

/// Header carrying the long-lived key.
pub const KEY_HEADER: &str = "x-token";

/// Exchange a long-lived key for a session token.
///
/// - 401: header missing or key unknown
/// - 403: key banned, now or by this request
/// - 503: credential store or geolocation unavailable
pub async fn validate(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let key = headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("X-Token header is required").with_code("missing_key"))?;

    issuance::check_key(&state.credentials, key)?;

    let location = state.geo.resolve(ip).await.map_err(IssuanceError::from)?;
    let record = issuance::admit(&state.credentials, key, &location)?;

    let token = state.sessions.mint(&record.id)?;
    info!(key = %redact(key), %ip, "session issued");

    Ok(Json(TokenResponse { token }))
}
