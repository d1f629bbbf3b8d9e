// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Everything the service needs is read from the environment exactly once at
//! startup into an immutable [`Config`], which is then shared through
//! `AppState`. No component reads the environment afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3839` |
//! | `DATA_DIR` | Directory holding the credential database | `./data` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; both set enables HTTPS | unset |
//! | `JWT_SECRET_KEY` | HS256 secret for session tokens | Required |
//! | `SESSION_LIFETIME_SECS` | Session token lifetime | `43200` (12h) |
//! | `APP_INTEGRITY_SECRET` | Shared secret for request signatures | Required |
//! | `INTEGRITY_SKEW_SECS` | Allowed client clock skew | `5` |
//! | `ENVELOPE_MODE` | `derived` (PBKDF2 + salt) or `direct` (deprecated) | `derived` |
//! | `PBKDF2_ITERATIONS` | Envelope key derivation rounds | `4096` |
//! | `GEO_API_URL` | IP geolocation base URL | `http://ip-api.com/json` |
//! | `GEO_CACHE_TTL_SECS` | Geolocation cache TTL | `432000` (120h) |
//! | `GEO_CACHE_CAPACITY` | Geolocation cache entries | `10000` |
//! | `UPSTREAM_TIMEOUT_SECS` | Timeout for every outbound HTTP call | `10` |
//! | `TRUSTED_PROXIES` | Comma-separated proxy IPs allowed to set `X-Forwarded-For` | `127.0.0.1` |
//! | `PRODUCTS_URL` | Product catalog feed | shop products.js |
//! | `ROUND_URL` | Activity round feed | shop classify_24.js |
//! | `UNIVERSAL_URL` / `WANNENG_URL` | Activity endpoints handed to clients | act.3839.com |
//! | `CLIENT_SECRET_KEY` | Key half of the client secret pair | `secret` |
//! | `CLIENT_SECRET_VALUE` | Value half of the client secret pair | Required |
//! | `CLIENT_AUX_SECRET` | Auxiliary client secret string | Required |
//! | `SEED_KEYS` | Comma-separated keys provisioned at startup | empty |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::crypto::EnvelopeMode;
use crate::telemetry::LogFormat;

/// Environment variable name for the credential database directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

const DEFAULT_PORT: u16 = 3839;
const DEFAULT_SESSION_LIFETIME_SECS: u64 = 12 * 60 * 60;
const DEFAULT_INTEGRITY_SKEW_SECS: u64 = 5;
const DEFAULT_PBKDF2_ITERATIONS: u32 = 4096;
const DEFAULT_GEO_API_URL: &str = "http://ip-api.com/json";
const DEFAULT_GEO_CACHE_TTL_SECS: u64 = 120 * 60 * 60;
const DEFAULT_GEO_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PRODUCTS_URL: &str = "https://shop.3839.com/html/js/products.js";
const DEFAULT_ROUND_URL: &str = "https://shop.3839.com/html/js/classify_24.js";
const DEFAULT_UNIVERSAL_URL: &str = "https://act.3839.com/n/hykb/universal/ajax.php";
const DEFAULT_WANNENG_URL: &str = "https://act.3839.com/n/hykb/wanneng/ajax.php";
const DEFAULT_CLIENT_SECRET_KEY: &str = "secret";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Remote feeds: the two the round collaborator reads and the two activity
/// endpoints handed to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUrls {
    pub products: Url,
    pub round: Url,
    pub universal: Url,
    pub wanneng: Url,
}

/// Static values served by the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub key: String,
    pub value: String,
    pub auxiliary: String,
}

const REDACTED: &str = "[redacted]";

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("key", &self.key)
            .field("value", &REDACTED)
            .field("auxiliary", &REDACTED)
            .finish()
    }
}

/// Immutable process configuration.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub tls: Option<TlsPaths>,
    pub session_secret: String,
    pub session_lifetime: Duration,
    pub integrity_secret: String,
    pub integrity_skew: Duration,
    pub envelope_mode: EnvelopeMode,
    pub pbkdf2_iterations: u32,
    pub geo_api_url: Url,
    pub geo_cache_ttl: Duration,
    pub geo_cache_capacity: usize,
    pub upstream_timeout: Duration,
    pub trusted_proxies: Vec<IpAddr>,
    pub feeds: FeedUrls,
    pub client_secrets: ClientSecrets,
    pub seed_keys: Vec<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("tls", &self.tls)
            .field("session_secret", &REDACTED)
            .field("session_lifetime", &self.session_lifetime)
            .field("integrity_secret", &REDACTED)
            .field("integrity_skew", &self.integrity_skew)
            .field("envelope_mode", &self.envelope_mode)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("geo_api_url", &self.geo_api_url)
            .field("geo_cache_ttl", &self.geo_cache_ttl)
            .field("geo_cache_capacity", &self.geo_cache_capacity)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("feeds", &self.feeds)
            .field("client_secrets", &self.client_secrets)
            .field("seed_keys", &self.seed_keys.len())
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let tls = match (env.get("TLS_CERT_PATH"), env.get("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TLS_CERT_PATH",
                    reason: "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
                })
            }
        };

        let pbkdf2_iterations = env.parse_or("PBKDF2_ITERATIONS", DEFAULT_PBKDF2_ITERATIONS)?;
        if pbkdf2_iterations == 0 {
            return Err(ConfigError::Invalid {
                name: "PBKDF2_ITERATIONS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse_or("PORT", DEFAULT_PORT)?,
            data_dir: env.get(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string()).into(),
            tls,
            session_secret: env.required("JWT_SECRET_KEY")?,
            session_lifetime: env.secs_or("SESSION_LIFETIME_SECS", DEFAULT_SESSION_LIFETIME_SECS)?,
            integrity_secret: env.required("APP_INTEGRITY_SECRET")?,
            integrity_skew: env.secs_or("INTEGRITY_SKEW_SECS", DEFAULT_INTEGRITY_SKEW_SECS)?,
            envelope_mode: env.parse_or("ENVELOPE_MODE", EnvelopeMode::Derived)?,
            pbkdf2_iterations,
            geo_api_url: env.url_or("GEO_API_URL", DEFAULT_GEO_API_URL)?,
            geo_cache_ttl: env.secs_or("GEO_CACHE_TTL_SECS", DEFAULT_GEO_CACHE_TTL_SECS)?,
            geo_cache_capacity: env.parse_or("GEO_CACHE_CAPACITY", DEFAULT_GEO_CACHE_CAPACITY)?,
            upstream_timeout: env.secs_or("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?,
            trusted_proxies: env.ip_list_or("TRUSTED_PROXIES", vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])?,
            feeds: FeedUrls {
                products: env.url_or("PRODUCTS_URL", DEFAULT_PRODUCTS_URL)?,
                round: env.url_or("ROUND_URL", DEFAULT_ROUND_URL)?,
                universal: env.url_or("UNIVERSAL_URL", DEFAULT_UNIVERSAL_URL)?,
                wanneng: env.url_or("WANNENG_URL", DEFAULT_WANNENG_URL)?,
            },
            client_secrets: ClientSecrets {
                key: env
                    .get("CLIENT_SECRET_KEY")
                    .unwrap_or_else(|| DEFAULT_CLIENT_SECRET_KEY.to_string()),
                value: env.required("CLIENT_SECRET_VALUE")?,
                auxiliary: env.required("CLIENT_AUX_SECRET")?,
            },
            seed_keys: env.list("SEED_KEYS"),
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Pretty)?,
        })
    }

    /// Path of the redb credential database.
    pub fn credentials_db_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::CREDENTIALS_DB_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Typed accessors over a variable lookup function.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value, if any.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn secs_or(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or(name, default).map(Duration::from_secs)
    }

    fn url_or(&self, name: &'static str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.get(name).unwrap_or_else(|| default.to_string());
        Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    }

    fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ip_list_or(&self, name: &'static str, default: Vec<IpAddr>) -> Result<Vec<IpAddr>, ConfigError> {
        if self.get(name).is_none() {
            return Ok(default);
        }
        self.list(name)
            .iter()
            .map(|raw| {
                raw.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                    name,
                    reason: format!("{raw}: {e}"),
                })
            })
            .collect()
    }
}
