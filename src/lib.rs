// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Geogate - key-bound session issuance with an encrypted gateway
//!
//! Clients hold a long-lived key. `POST /validate` exchanges it for a short
//! session token after binding the key to the region it is used from;
//! `POST /api/v1/gateway` answers opaque target codes with responses sealed
//! under the caller's key.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Session tokens, request integrity, risk-control issuance
//! - `crypto` - Response envelopes (AES-256-GCM)
//! - `gateway` - Target codes and the round-data collaborator
//! - `geo` - Cached IP geolocation
//! - `storage` - Credential store (redb) and geolocation cache

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
