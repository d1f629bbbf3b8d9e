// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # IP Geolocation
//!
//! [`GeoResolver`] turns a client IP into a [`Location`] for the risk-control
//! policy. Lookups go through [`GeoCache`](crate::storage::GeoCache) first;
//! misses call a [`GeoLookup`] implementation (normally [`IpApiClient`]).
//!
//! Loopback addresses never leave the process: they resolve to a fixed
//! sentinel location so local development works without network access.

pub mod client;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::models::GeoInfo;
use crate::storage::GeoCache;

pub use client::IpApiClient;

/// Sentinel province for loopback callers.
pub const LOOPBACK_PROVINCE: &str = "local";
/// Sentinel city for loopback callers.
pub const LOOPBACK_CITY: &str = "development";

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Transport(String),

    #[error("geolocation service returned HTTP {0}")]
    Status(u16),

    #[error("geolocation response was invalid: {0}")]
    InvalidResponse(String),

    #[error("geolocation lookup was not successful: {0}")]
    Lookup(String),
}

/// External IP → location service.
///
/// Implementations return the raw response body; decoding and the success
/// check happen in [`GeoResolver`] so the exact bytes can be cached.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn fetch(&self, ip: IpAddr) -> Result<Vec<u8>, GeoError>;
}

/// Resolved location of a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub ip: String,
    pub province: String,
    pub city: String,
}

impl Location {
    pub fn new(ip: impl Into<String>, province: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            province: province.into(),
            city: city.into(),
        }
    }

    fn from_info(ip: IpAddr, info: GeoInfo) -> Self {
        Self {
            ip: ip.to_string(),
            province: info.region_name,
            city: info.city,
        }
    }
}

/// Cache-fronted geolocation.
#[derive(Clone)]
pub struct GeoResolver {
    cache: Arc<GeoCache>,
    lookup: Arc<dyn GeoLookup>,
}

impl GeoResolver {
    pub fn new(cache: Arc<GeoCache>, lookup: Arc<dyn GeoLookup>) -> Self {
        Self { cache, lookup }
    }

    /// Resolve `ip` to a location.
    ///
    /// IPv4-mapped IPv6 addresses are treated as the IPv4 address they
    /// carry. Failed lookups are returned as errors and never cached.
    pub async fn resolve(&self, ip: IpAddr) -> Result<Location, GeoError> {
        let ip = ip.to_canonical();
        if ip.is_loopback() {
            debug!(%ip, "loopback address, using sentinel location");
            return Ok(Location::new(ip.to_string(), LOOPBACK_PROVINCE, LOOPBACK_CITY));
        }

        if let Some(info) = self.cache.lookup(ip) {
            debug!(%ip, "geolocation cache hit");
            return Ok(Location::from_info(ip, info));
        }

        debug!(%ip, "geolocation cache miss, querying upstream");
        let body = self.lookup.fetch(ip).await?;
        let info: GeoInfo =
            serde_json::from_slice(&body).map_err(|e| GeoError::InvalidResponse(e.to_string()))?;
        if !info.is_success() {
            return Err(GeoError::Lookup(info.message));
        }

        self.cache.store(ip, body);
        Ok(Location::from_info(ip, info))
    }
}
