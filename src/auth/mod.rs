// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Two credentials guard the service:
//!
//! - a **long-lived key** (`X-Token` on `POST /validate`), exchanged for a
//!   session after the risk-control policy in [`issuance`] accepts the
//!   caller's location;
//! - a **session token** (`Authorization: Bearer <jwt>`), HS256-signed and
//!   stateless, carrying the key as its subject.
//!
//! Protected routes additionally require a request [`integrity`] signature,
//! checked as route middleware before the session is looked at.
//!
//! ## Security
//!
//! - Banned keys never get another session
//! - Clock skew tolerance is 60 seconds for session expiry
//! - Keys appear in logs only in redacted form

pub mod claims;
pub mod error;
pub mod extractor;
pub mod integrity;
pub mod issuance;
pub mod session;

pub use claims::{AuthenticatedKey, SessionClaims};
pub use error::AuthError;
pub use extractor::{Auth, ClientIp};
pub use integrity::{require_integrity, IntegrityVerifier};
pub use issuance::IssuanceError;
pub use session::SessionIssuer;
