// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for ip-api.com style geolocation services.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{GeoError, GeoLookup};

/// Calls `GET {base_url}/{ip}`.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    base_url: Url,
    http: Client,
}

impl IpApiClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GeoError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeoError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    /// URL queried for `ip`.
    pub fn lookup_url(&self, ip: IpAddr) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), ip)
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn fetch(&self, ip: IpAddr) -> Result<Vec<u8>, GeoError> {
        let response = self
            .http
            .get(self.lookup_url(ip))
            .send()
            .await
            .map_err(|e| GeoError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GeoError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }
}
