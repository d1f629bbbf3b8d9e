// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multiplexed gateway endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::debug;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::gateway::Target;
use crate::models::{EncryptedResponse, GatewayRequest};
use crate::state::AppState;

/// Answer a target code with an encrypted payload.
///
/// The envelope is keyed with the caller's long-lived key, so only the
/// holder of that key can read the answer.
pub async fn gateway(
    State(state): State<AppState>,
    Auth(session): Auth,
    body: Result<Json<GatewayRequest>, JsonRejection>,
) -> Result<Json<EncryptedResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        debug!(error = %e, "rejected gateway body");
        ApiError::bad_request("Invalid request body")
    })?;

    let target = Target::try_from(request)?;
    let payload = state.gateway.dispatch(target).await?;
    let sealed = state.envelope.seal_json(&payload, session.key.as_bytes())?;

    Ok(Json(EncryptedResponse { payload: sealed }))
}
