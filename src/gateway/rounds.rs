// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Round data from the shop feeds.
//!
//! Two feeds are published as JavaScript assignments:
//!
//! - products: `var products={"<id>": {product_name, jump_url, create_at, ...}, ...};`
//! - rounds:   `var classify_24=[{"product_id": "<id>"}, ...];`
//!
//! [`correlate`] joins them, keeping rounds whose product links to the
//! requested [`RoundKind`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::USER_AGENT, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const PRODUCTS_PREFIX: &str = "var products=";
const ROUNDS_PREFIX: &str = "var classify_24=";

/// The feeds reject non-browser agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    Universal,
    Wanneng,
}

impl RoundKind {
    /// Substring a product's `jump_url` must contain.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundKind::Universal => "universal",
            RoundKind::Wanneng => "wanneng",
        }
    }

    /// Parse the gateway `p` code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "u1" => Some(RoundKind::Universal),
            "w1" => Some(RoundKind::Wanneng),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidRound {
    pub name: String,
    pub url: String,
    pub created: String,
    pub is_finished: bool,
}

/// Entry of the rounds feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProductRound {
    pub product_id: String,
}

/// Products feed, keyed by product id. Entries are kept untyped so one
/// malformed product cannot fail the whole feed; [`CatalogEntry`] checks
/// them one at a time.
pub type Catalog = HashMap<String, Value>;

/// Catalog entry that is not an object, or whose field is absent or not a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("product {product_id}: {field} is missing or mistyped")]
pub struct PartialRecord {
    pub product_id: String,
    pub field: &'static str,
}

/// Typed view of one products-feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product_name: String,
    pub jump_url: String,
    pub create_at: String,
}

impl CatalogEntry {
    /// `field` name reported when the entry itself is not an object.
    pub const WHOLE_ENTRY: &'static str = "entry";

    fn string_field<'a>(product_id: &str, raw: &'a Value, field: &'static str) -> Result<&'a str, PartialRecord> {
        let partial = |field| PartialRecord {
            product_id: product_id.to_string(),
            field,
        };
        raw.as_object()
            .ok_or_else(|| partial(Self::WHOLE_ENTRY))?
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| partial(field))
    }

    pub fn jump_url<'a>(product_id: &str, raw: &'a Value) -> Result<&'a str, PartialRecord> {
        Self::string_field(product_id, raw, "jump_url")
    }

    pub fn from_raw(product_id: &str, raw: &Value) -> Result<Self, PartialRecord> {
        Ok(Self {
            jump_url: Self::jump_url(product_id, raw)?.to_string(),
            product_name: Self::string_field(product_id, raw, "product_name")?.to_string(),
            create_at: Self::string_field(product_id, raw, "create_at")?.to_string(),
        })
    }
}

/// Join rounds with the catalog, keeping feed order.
///
/// Rounds for unknown products are skipped silently; entries with
/// mistyped fields are skipped with a warning.
pub fn correlate(catalog: &Catalog, rounds: &[ProductRound], kind: RoundKind) -> Vec<ValidRound> {
    let mut valid = Vec::new();

    for round in rounds {
        let Some(raw) = catalog.get(&round.product_id) else {
            continue;
        };

        let jump_url = match CatalogEntry::jump_url(&round.product_id, raw) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "skipping catalog entry");
                continue;
            }
        };
        if !jump_url.contains(kind.as_str()) {
            continue;
        }

        match CatalogEntry::from_raw(&round.product_id, raw) {
            Ok(entry) => valid.push(ValidRound {
                name: entry.product_name,
                url: entry.jump_url.replace("amp;", ""),
                created: entry.create_at,
                is_finished: false,
            }),
            Err(e) => warn!(error = %e, "skipping catalog entry"),
        }
    }

    valid
}

#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error("{feed} feed request failed: {reason}")]
    Transport { feed: &'static str, reason: String },

    #[error("{feed} feed returned HTTP {status}")]
    Status { feed: &'static str, status: u16 },

    #[error("{feed} feed could not be decoded: {reason}")]
    Decode { feed: &'static str, reason: String },
}

/// Provider of round data for the `d4` target.
#[async_trait]
pub trait RoundSource: Send + Sync {
    async fn valid_rounds(&self, kind: RoundKind) -> Result<Vec<ValidRound>, RoundError>;
}

/// Strip the `var name=` prefix and trailing `;` from a feed body.
fn unwrap_assignment<'a>(body: &'a str, prefix: &str) -> &'a str {
    let body = body.trim();
    let body = body.strip_prefix(prefix).unwrap_or(body);
    body.strip_suffix(';').unwrap_or(body)
}

/// Reads the products and rounds feeds over HTTP.
#[derive(Debug, Clone)]
pub struct ShopFeedClient {
    products_url: Url,
    rounds_url: Url,
    http: Client,
}

impl ShopFeedClient {
    pub fn new(products_url: Url, rounds_url: Url, timeout: Duration) -> Result<Self, RoundError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoundError::Transport {
                feed: "shop",
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            products_url,
            rounds_url,
            http,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        feed: &'static str,
        base: &Url,
        prefix: &str,
        cache_buster: &str,
    ) -> Result<T, RoundError> {
        let mut url = base.clone();
        url.set_query(Some(cache_buster));

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| RoundError::Transport {
                feed,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RoundError::Status {
                feed,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| RoundError::Transport {
            feed,
            reason: e.to_string(),
        })?;

        serde_json::from_str(unwrap_assignment(&body, prefix)).map_err(|e| RoundError::Decode {
            feed,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl RoundSource for ShopFeedClient {
    async fn valid_rounds(&self, kind: RoundKind) -> Result<Vec<ValidRound>, RoundError> {
        let cache_buster = Utc::now().timestamp().to_string();

        let catalog: Catalog = self
            .fetch("products", &self.products_url, PRODUCTS_PREFIX, &cache_buster)
            .await?;
        let rounds: Vec<ProductRound> = self
            .fetch("rounds", &self.rounds_url, ROUNDS_PREFIX, &cache_buster)
            .await?;

        let valid = correlate(&catalog, &rounds, kind);
        debug!(%kind, products = catalog.len(), rounds = rounds.len(), valid = valid.len(), "rounds correlated");
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(value: Value) -> Catalog {
        serde_json::from_value(value).unwrap()
    }

    fn rounds(ids: &[&str]) -> Vec<ProductRound> {
        ids.iter()
            .map(|id| ProductRound {
                product_id: id.to_string(),
            })
            .collect()
    }

    #[test]
    fn round_codes() {
        assert_eq!(RoundKind::from_code("u1"), Some(RoundKind::Universal));
        assert_eq!(RoundKind::from_code("w1"), Some(RoundKind::Wanneng));
        assert_eq!(RoundKind::from_code("x9"), None);
    }

    #[test]
    fn unwraps_javascript_assignments() {
        assert_eq!(unwrap_assignment("var products={\"a\":{}};\n", PRODUCTS_PREFIX), "{\"a\":{}}");
        assert_eq!(unwrap_assignment("var classify_24=[];", ROUNDS_PREFIX), "[]");
        assert_eq!(unwrap_assignment("[]", ROUNDS_PREFIX), "[]");
    }

    #[test]
    fn correlate_filters_and_keeps_order() {
        let catalog = catalog(json!({
            "1": {"product_name": "Spin A", "jump_url": "https://shop/universal?a=1&amp;b=2", "create_at": "2024-01-01"},
            "2": {"product_name": "Spin B", "jump_url": "https://shop/wanneng?x=1", "create_at": "2024-01-02"},
            "3": {"product_name": "Spin C", "jump_url": "https://shop/universal?c=3", "create_at": "2024-01-03"},
        }));

        let valid = correlate(&catalog, &rounds(&["3", "missing", "2", "1"]), RoundKind::Universal);
        assert_eq!(
            valid,
            vec![
                ValidRound {
                    name: "Spin C".into(),
                    url: "https://shop/universal?c=3".into(),
                    created: "2024-01-03".into(),
                    is_finished: false,
                },
                ValidRound {
                    name: "Spin A".into(),
                    url: "https://shop/universal?a=1&b=2".into(),
                    created: "2024-01-01".into(),
                    is_finished: false,
                },
            ]
        );

        let valid = correlate(&catalog, &rounds(&["1", "2"]), RoundKind::Wanneng);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "Spin B");
    }

    #[test]
    fn mistyped_entries_are_skipped() {
        let catalog = catalog(json!({
            "1": {"product_name": "No url", "jump_url": 42, "create_at": "2024-01-01"},
            "2": {"product_name": 7, "jump_url": "https://shop/universal", "create_at": "2024-01-02"},
            "3": {"product_name": "Ok", "jump_url": "https://shop/universal", "create_at": "2024-01-03"},
        }));

        let valid = correlate(&catalog, &rounds(&["1", "2", "3"]), RoundKind::Universal);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "Ok");
    }

    #[test]
    fn partial_record_names_the_field() {
        let raw = json!({"jump_url": "u", "create_at": null});
        let err = CatalogEntry::from_raw("9", &raw).unwrap_err();
        assert_eq!(err.field, "product_name");
        assert_eq!(err.product_id, "9");
    }

    #[test]
    fn non_object_entries_do_not_fail_the_feed() {
        let body = r#"var products={
            "1": {"product_name": "Ok", "jump_url": "https://shop/universal", "create_at": "2024-01-01"},
            "2": null,
            "3": [1, 2]
        };"#;
        let catalog: Catalog = serde_json::from_str(unwrap_assignment(body, PRODUCTS_PREFIX)).unwrap();
        assert_eq!(catalog.len(), 3);

        let err = CatalogEntry::jump_url("2", &catalog["2"]).unwrap_err();
        assert_eq!(err.field, CatalogEntry::WHOLE_ENTRY);

        let valid = correlate(&catalog, &rounds(&["2", "3", "1"]), RoundKind::Universal);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "Ok");
    }

    mod http {
        use std::sync::{Arc, Mutex};

        use axum::{
            extract::RawQuery,
            http::{HeaderMap, StatusCode},
            routing::{get, MethodRouter},
            Router,
        };

        use super::super::*;

        #[derive(Debug, Clone)]
        struct Hit {
            feed: &'static str,
            query: Option<String>,
            agent: Option<String>,
        }

        #[derive(Clone, Default)]
        struct Hits(Arc<Mutex<Vec<Hit>>>);

        fn feed(name: &'static str, status: StatusCode, body: &'static str, hits: Hits) -> MethodRouter {
            get(move |RawQuery(query): RawQuery, headers: HeaderMap| {
                let hits = hits.clone();
                async move {
                    let agent = headers
                        .get(USER_AGENT)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    hits.0.lock().unwrap().push(Hit {
                        feed: name,
                        query,
                        agent,
                    });
                    (status, body)
                }
            })
        }

        async fn shop(products: (StatusCode, &'static str), rounds: (StatusCode, &'static str)) -> (ShopFeedClient, Hits) {
            let hits = Hits::default();
            let app = Router::new()
                .route("/products.js", feed("products", products.0, products.1, hits.clone()))
                .route("/classify_24.js", feed("rounds", rounds.0, rounds.1, hits.clone()));

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let client = ShopFeedClient::new(
                Url::parse(&format!("http://{addr}/products.js")).unwrap(),
                Url::parse(&format!("http://{addr}/classify_24.js")).unwrap(),
                Duration::from_secs(5),
            )
            .unwrap();
            (client, hits)
        }

        const PRODUCTS: &str = r#"var products={"1":{"product_name":"Spin","jump_url":"https://shop/universal?a=1&amp;b=2","create_at":"2024-01-01"},"2":null};"#;
        const ROUNDS: &str = r#"var classify_24=[{"product_id":"2"},{"product_id":"1"}];"#;

        #[tokio::test]
        async fn fetches_both_feeds_with_cache_buster_and_browser_agent() {
            let (client, hits) = shop((StatusCode::OK, PRODUCTS), (StatusCode::OK, ROUNDS)).await;

            let valid = client.valid_rounds(RoundKind::Universal).await.unwrap();
            assert_eq!(
                valid,
                vec![ValidRound {
                    name: "Spin".into(),
                    url: "https://shop/universal?a=1&b=2".into(),
                    created: "2024-01-01".into(),
                    is_finished: false,
                }]
            );

            let hits = hits.0.lock().unwrap().clone();
            assert_eq!(hits.iter().map(|h| h.feed).collect::<Vec<_>>(), ["products", "rounds"]);
            let now = Utc::now().timestamp();
            for hit in &hits {
                let stamp: i64 = hit.query.as_deref().unwrap().parse().unwrap();
                assert!((now - stamp).abs() < 60);
                assert_eq!(hit.agent.as_deref(), Some(BROWSER_USER_AGENT));
            }
            assert_eq!(hits[0].query, hits[1].query);
        }

        #[tokio::test]
        async fn non_success_status_is_reported_per_feed() {
            let (client, _) = shop((StatusCode::OK, PRODUCTS), (StatusCode::NOT_FOUND, "")).await;
            assert!(matches!(
                client.valid_rounds(RoundKind::Universal).await,
                Err(RoundError::Status {
                    feed: "rounds",
                    status: 404
                })
            ));

            let (client, hits) = shop((StatusCode::BAD_GATEWAY, ""), (StatusCode::OK, ROUNDS)).await;
            assert!(matches!(
                client.valid_rounds(RoundKind::Wanneng).await,
                Err(RoundError::Status {
                    feed: "products",
                    status: 502
                })
            ));
            assert_eq!(hits.0.lock().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn undecodable_feed_is_a_decode_error() {
            let (client, _) = shop((StatusCode::OK, "var products=<html>;"), (StatusCode::OK, ROUNDS)).await;
            assert!(matches!(
                client.valid_rounds(RoundKind::Universal).await,
                Err(RoundError::Decode { feed: "products", .. })
            ));
        }
    }
}
