// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Request/response bodies for the HTTP surface and the records shared
//! between the credential store, geo resolution and the gateway.
//!
//! ## Model Categories
//!
//! - **Credentials**: [`KeyRecord`] and its [`KeyStatus`]
//! - **Geolocation**: [`GeoInfo`] as returned by the lookup service
//! - **Wire bodies**: [`TokenResponse`], [`GatewayRequest`], [`EncryptedResponse`]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of distinct cities a key may be bound to.
pub const MAX_BOUND_CITIES: usize = 2;

// =============================================================================
// Credentials
// =============================================================================

/// Lifecycle status of a long-lived key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    #[default]
    Active,
    /// Terminal. A banned key never issues another session.
    Banned,
}

/// One record per long-lived key.
///
/// `bound_province` is set once by the first successful issuance and never
/// changes afterwards. `bound_cities` only grows, up to [`MAX_BOUND_CITIES`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: String,
    #[serde(default)]
    pub status: KeyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_province: Option<String>,
    #[serde(default)]
    pub bound_cities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// A freshly provisioned, unbound, active record.
    pub fn provisioned(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: KeyStatus::Active,
            bound_province: None,
            bound_cities: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_banned(&self) -> bool {
        self.status == KeyStatus::Banned
    }

    pub fn knows_city(&self, city: &str) -> bool {
        self.bound_cities.iter().any(|c| c == city)
    }

    pub fn has_room_for_city(&self) -> bool {
        self.bound_cities.len() < MAX_BOUND_CITIES
    }
}

// =============================================================================
// Geolocation
// =============================================================================

/// Body returned by the IP geolocation service.
///
/// Every field is optional on the wire; a failed lookup usually carries only
/// `status` and `message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GeoInfo {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub country: String,
    /// Province / region.
    #[serde(default, rename = "regionName")]
    pub region_name: String,
    #[serde(default)]
    pub city: String,
    /// The IP the answer is about.
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl GeoInfo {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// =============================================================================
// Wire bodies
// =============================================================================

/// Response for POST /validate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

/// Request body for POST /api/v1/gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayRequest {
    pub target: String,
    #[serde(default, rename = "p", skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, String>>,
}

/// Wrapper for every protected response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedResponse {
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_record_defaults_from_sparse_json() {
        let record: KeyRecord = serde_json::from_str(
            r#"{"id":"VALID_KEY_123","created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.status, KeyStatus::Active);
        assert!(record.bound_province.is_none());
        assert!(record.bound_cities.is_empty());
    }

    #[test]
    fn key_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&KeyStatus::Banned).unwrap(), r#""banned""#);
    }

    #[test]
    fn geo_info_reads_region_name() {
        let info: GeoInfo = serde_json::from_str(
            r#"{"status":"success","country":"China","regionName":"Zhejiang","city":"Hangzhou","query":"1.2.3.4"}"#,
        )
        .unwrap();
        assert!(info.is_success());
        assert_eq!(info.region_name, "Zhejiang");
        assert_eq!(info.city, "Hangzhou");
    }

    #[test]
    fn gateway_request_reads_short_param_name() {
        let req: GatewayRequest =
            serde_json::from_str(r#"{"target":"d4","p":"u1"}"#).unwrap();
        assert_eq!(req.target, "d4");
        assert_eq!(req.param.as_deref(), Some("u1"));
        assert!(req.params.is_none());
    }
}
