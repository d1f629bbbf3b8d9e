// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated session and the caller's IP.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(session): Auth) -> impl IntoResponse {
//!     // session is AuthenticatedKey
//! }
//! ```

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedKey};
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Extractor for a verified bearer session.
///
/// Rejects with 401 when the `Authorization` header is missing, is not
/// `Bearer <token>`, or the token fails verification.
pub struct Auth(pub AuthenticatedKey);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<AuthenticatedKey>().cloned() {
            return Ok(Auth(session));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let session = state.sessions.verify(token)?;
        parts.extensions.insert(session.clone());

        Ok(Auth(session))
    }
}

/// The caller's address as used for geolocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or_else(|| AuthError::InternalError("connection info unavailable".into()))?;

        Ok(ClientIp(resolve_client_ip(peer, &parts.headers, &state.config.trusted_proxies)))
    }
}

/// Pick the client address for a request arriving from `peer`.
///
/// Forwarding headers are only honoured when `peer` is a trusted proxy.
/// `X-Forwarded-For` is walked right to left, skipping trusted hops;
/// `X-Real-IP` is the fallback. IPv4-mapped addresses compare equal to the
/// IPv4 address they carry.
pub fn resolve_client_ip(peer: IpAddr, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> IpAddr {
    let is_trusted = |ip: IpAddr| trusted_proxies.iter().any(|p| p.to_canonical() == ip);

    let peer = peer.to_canonical();
    if !is_trusted(peer) {
        return peer;
    }

    let forwarded = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok());
    if let Some(chain) = forwarded {
        for hop in chain.rsplit(',') {
            match hop.trim().parse::<IpAddr>().map(|ip| ip.to_canonical()) {
                Ok(ip) if is_trusted(ip) => continue,
                Ok(ip) => return ip,
                Err(_) => break,
            }
        }
    }

    headers
        .get(REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_canonical())
        .unwrap_or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    use crate::gateway::tests::StubRounds;
    use crate::geo::tests::StubLookup;
    use crate::state::tests::test_state;

    fn create_test_state() -> AppState {
        test_state(StubLookup::default(), StubRounds(Some(vec![])))
    }

    fn parts_with(header: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let state = create_test_state();
        let mut parts = parts_with(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer() {
        let state = create_test_state();
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz".to_string()));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));

        let mut parts = parts_with(Some("Bearer ".to_string()));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_session_token() {
        let state = create_test_state();
        let token = state.sessions.mint("VALID_KEY_123").unwrap();
        let mut parts = parts_with(Some(format!("Bearer {token}")));

        let Auth(session) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(session.key, "VALID_KEY_123");
        assert_eq!(parts.extensions.get::<AuthenticatedKey>(), Some(&session));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let state = create_test_state();
        let mut parts = parts_with(None);
        parts.extensions.insert(AuthenticatedKey {
            key: "from_extension".to_string(),
            issued_at: 0,
            expires_at: 0,
        });

        let Auth(session) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(session.key, "from_extension");
    }

    #[tokio::test]
    async fn client_ip_requires_connect_info() {
        let state = create_test_state();
        let mut parts = parts_with(None);
        assert!(matches!(
            ClientIp::from_request_parts(&mut parts, &state).await,
            Err(AuthError::InternalError(_))
        ));

        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([1, 2, 3, 4], 5000))));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(ip, "1.2.3.4".parse::<IpAddr>().unwrap());
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn untrusted_peer_ignores_forwarding_headers() {
        let h = headers(&[(FORWARDED_FOR, "9.9.9.9"), (REAL_IP, "8.8.8.8")]);
        assert_eq!(resolve_client_ip(ip("1.2.3.4"), &h, &[ip("127.0.0.1")]), ip("1.2.3.4"));
    }

    #[test]
    fn trusted_peer_uses_rightmost_untrusted_hop() {
        let trusted = [ip("127.0.0.1"), ip("10.0.0.2")];
        let h = headers(&[(FORWARDED_FOR, "6.6.6.6, 1.2.3.4, 10.0.0.2")]);
        assert_eq!(resolve_client_ip(ip("127.0.0.1"), &h, &trusted), ip("1.2.3.4"));
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let trusted = [ip("127.0.0.1")];
        let h = headers(&[(FORWARDED_FOR, "garbage"), (REAL_IP, "5.6.7.8")]);
        assert_eq!(resolve_client_ip(ip("127.0.0.1"), &h, &trusted), ip("5.6.7.8"));

        assert_eq!(
            resolve_client_ip(ip("127.0.0.1"), &HeaderMap::new(), &trusted),
            ip("127.0.0.1")
        );
    }

    #[test]
    fn mapped_ipv4_peer_counts_as_trusted_proxy() {
        let trusted = [ip("127.0.0.1")];
        let h = headers(&[(FORWARDED_FOR, "::ffff:1.2.3.4")]);
        assert_eq!(resolve_client_ip(ip("::ffff:127.0.0.1"), &h, &trusted), ip("1.2.3.4"));

        assert_eq!(
            resolve_client_ip(ip("::ffff:9.9.9.9"), &HeaderMap::new(), &trusted),
            ip("9.9.9.9")
        );
    }
}
