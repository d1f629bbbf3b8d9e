// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session claims and the authenticated caller representation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of an issued session token.
///
/// Nothing about a session is stored server-side; a token is valid exactly
/// when its signature checks out and `exp` has not passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject: the long-lived key the session was issued for
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(subject: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: subject.into(),
            iat,
            exp: iat.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
        }
    }
}

/// Caller proven by a valid session token.
///
/// This is the type handlers receive from the `Auth` extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedKey {
    /// The long-lived key (token subject). Also the envelope key material.
    pub key: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl AuthenticatedKey {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            key: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_issue_time_plus_lifetime() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims = SessionClaims::new("VALID_KEY_123", issued_at, Duration::from_secs(12 * 3600));
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_043_200);
    }

    #[test]
    fn oversized_lifetime_saturates() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims = SessionClaims::new("k", issued_at, Duration::from_secs(u64::MAX));
        assert_eq!(claims.exp, i64::MAX);
    }

    #[test]
    fn from_claims_extracts_key() {
        let key = AuthenticatedKey::from_claims(SessionClaims {
            sub: "k".into(),
            iat: 1,
            exp: 2,
        });
        assert_eq!(key.key, "k");
        assert_eq!(key.expires_at, 2);
    }
}
