// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Shared mutable state lives here and nowhere else.
//!
//! - [`CredentialStore`]: durable long-lived key records in an embedded
//!   redb database. All risk-control transitions go through its
//!   compare-and-set operations.
//! - [`GeoCache`]: time-bounded LRU of raw geolocation answers keyed by IP.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   credentials.redb   # keys table: key id -> KeyRecord (JSON)
//! ```

pub mod credentials;
pub mod geo_cache;

pub use credentials::{CasOutcome, CredentialStore, StoreError, StoreResult};
pub use geo_cache::GeoCache;

/// File name of the credential database under `DATA_DIR`.
pub const CREDENTIALS_DB_FILE: &str = "credentials.redb";
