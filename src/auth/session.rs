// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token minting and verification (HS256 JWT).

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{AuthenticatedKey, SessionClaims};
use super::AuthError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Signs and verifies stateless session tokens.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Mint a token for `subject` valid from now.
    pub fn mint(&self, subject: &str) -> Result<String, AuthError> {
        self.mint_at(subject, Utc::now())
    }

    pub fn mint_at(&self, subject: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = SessionClaims::new(subject, issued_at, self.lifetime);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("failed to sign session token: {e}")))
    }

    /// Verify signature and expiry, returning the caller.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedKey, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        Ok(AuthenticatedKey::from_claims(token_data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> SessionIssuer {
        SessionIssuer::new(secret.as_bytes(), Duration::from_secs(12 * 3600))
    }

    #[test]
    fn minted_token_verifies() {
        let issuer = issuer("jwt-secret");
        let token = issuer.mint("VALID_KEY_123").unwrap();

        let key = issuer.verify(&token).unwrap();
        assert_eq!(key.key, "VALID_KEY_123");
        assert_eq!(key.expires_at - key.issued_at, 12 * 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = issuer("other-secret").mint("VALID_KEY_123").unwrap();
        assert!(matches!(issuer("jwt-secret").verify(&token), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer("jwt-secret");
        let token = issuer
            .mint_at("VALID_KEY_123", Utc::now() - chrono::Duration::hours(13))
            .unwrap();
        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer("jwt-secret");
        assert!(matches!(issuer.verify("not.a.jwt"), Err(AuthError::MalformedToken)));
        assert!(matches!(issuer.verify(""), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let issuer = issuer("jwt-secret");
        let token = issuer.mint("").unwrap();
        assert!(matches!(issuer.verify(&token), Err(AuthError::MalformedToken)));
    }
}
