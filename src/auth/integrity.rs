// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request integrity signatures.
//!
//! Legitimate clients sign every protected request with a shared secret:
//!
//! ```text
//! X-Timestamp: <unix seconds>
//! X-Signature: hex(HMAC-SHA256(secret, "{path},{timestamp}"))
//! ```
//!
//! The timestamp is signed exactly as sent in the header, so the canonical
//! string is reproducible on both sides without reformatting.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use super::AuthError;
use crate::state::AppState;

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

type HmacSha256 = Hmac<Sha256>;

/// Verifies `X-Timestamp` / `X-Signature` pairs.
#[derive(Clone)]
pub struct IntegrityVerifier {
    mac: HmacSha256,
    max_skew: i64,
}

impl IntegrityVerifier {
    pub fn new(secret: &[u8], max_skew: Duration) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length"),
            max_skew: i64::try_from(max_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }

    fn keyed(&self, path: &str, timestamp: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(path.as_bytes());
        mac.update(b",");
        mac.update(timestamp.as_bytes());
        mac
    }

    /// Lowercase hex signature for `path` at `timestamp`.
    pub fn sign(&self, path: &str, timestamp: &str) -> String {
        hex::encode(self.keyed(path, timestamp).finalize().into_bytes())
    }

    pub fn verify(&self, path: &str, timestamp: Option<&str>, signature: Option<&str>) -> Result<(), AuthError> {
        self.verify_at(path, timestamp, signature, Utc::now().timestamp())
    }

    /// Check a header pair against server time `now` (unix seconds).
    pub fn verify_at(
        &self,
        path: &str,
        timestamp: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> Result<(), AuthError> {
        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            return Err(AuthError::MissingIntegrityHeaders);
        };
        if timestamp.is_empty() || signature.is_empty() {
            return Err(AuthError::MissingIntegrityHeaders);
        }

        let sent_at: i64 = timestamp.parse().map_err(|_| AuthError::InvalidTimestamp)?;
        if now.abs_diff(sent_at) > self.max_skew.unsigned_abs() {
            return Err(AuthError::StaleTimestamp);
        }

        let provided = hex::decode(signature).map_err(|_| AuthError::SignatureMismatch)?;
        self.keyed(path, timestamp)
            .verify_slice(&provided)
            .map_err(|_| AuthError::SignatureMismatch)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Route middleware rejecting requests without a valid integrity signature.
///
/// Runs before the bearer session is looked at.
pub async fn require_integrity(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let verdict = state.integrity.verify(
        request.uri().path(),
        header_str(request.headers(), TIMESTAMP_HEADER),
        header_str(request.headers(), SIGNATURE_HEADER),
    );

    match verdict {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(path = %request.uri().path(), error_code = e.error_code(), "integrity check failed");
            e.into_response()
        }
    }
}
