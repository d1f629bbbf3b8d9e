// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Geolocation answers cached per client address.
//!
//! The upstream body is stored exactly as received and decoded on every
//! read. An entry that no longer decodes to a successful [`GeoInfo`] is
//! evicted and reported as a miss, as is an entry past its TTL.

use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::warn;

use crate::models::GeoInfo;

struct CachedAnswer {
    body: Vec<u8>,
    expires_at: Instant,
}

/// In-process LRU of geolocation answers with a per-entry TTL.
///
/// Addresses are canonicalised, so `::ffff:1.2.3.4` and `1.2.3.4` share
/// one entry.
pub struct GeoCache {
    answers: Mutex<LruCache<IpAddr, CachedAnswer>>,
    ttl: Duration,
}

impl GeoCache {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            answers: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))),
            ttl,
        }
    }

    /// Decoded answer for `ip`, if a fresh and successful one is cached.
    pub fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        let ip = ip.to_canonical();
        let mut answers = self.answers.lock().ok()?;

        let decoded = match answers.get(&ip) {
            None => return None,
            Some(answer) if answer.expires_at <= Instant::now() => None,
            Some(answer) => Some(serde_json::from_slice::<GeoInfo>(&answer.body)),
        };

        match decoded {
            Some(Ok(info)) if info.is_success() => return Some(info),
            Some(_) => warn!(%ip, "evicting malformed geolocation entry"),
            None => {}
        }
        answers.pop(&ip);
        None
    }

    /// Remember the upstream body for `ip`.
    pub fn store(&self, ip: IpAddr, body: Vec<u8>) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.put(
                ip.to_canonical(),
                CachedAnswer {
                    body,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANGZHOU: &[u8] = br#"{"status":"success","regionName":"Zhejiang","city":"Hangzhou","query":"1.2.3.4"}"#;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn stored_answer_is_decoded_on_lookup() {
        let cache = GeoCache::new(10, Duration::from_secs(300));
        assert!(cache.lookup(ip("1.2.3.4")).is_none());

        cache.store(ip("1.2.3.4"), HANGZHOU.to_vec());
        let info = cache.lookup(ip("1.2.3.4")).unwrap();
        assert_eq!(info.region_name, "Zhejiang");
        assert_eq!(info.city, "Hangzhou");
        assert!(cache.lookup(ip("5.6.7.8")).is_none());
    }

    #[test]
    fn mapped_and_plain_ipv4_share_an_entry() {
        let cache = GeoCache::new(10, Duration::from_secs(300));
        cache.store(ip("::ffff:1.2.3.4"), HANGZHOU.to_vec());
        assert_eq!(cache.lookup(ip("1.2.3.4")).unwrap().city, "Hangzhou");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn undecodable_or_failed_answers_are_evicted() {
        let cache = GeoCache::new(10, Duration::from_secs(300));
        cache.store(ip("1.2.3.4"), b"{not json".to_vec());
        cache.store(ip("10.0.0.1"), br#"{"status":"fail","message":"private range"}"#.to_vec());

        assert!(cache.lookup(ip("1.2.3.4")).is_none());
        assert!(cache.lookup(ip("10.0.0.1")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_answers_are_evicted() {
        let cache = GeoCache::new(10, Duration::from_millis(1));
        cache.store(ip("1.2.3.4"), HANGZHOU.to_vec());

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.lookup(ip("1.2.3.4")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recently_used_address_goes_first() {
        let cache = GeoCache::new(2, Duration::from_secs(300));
        cache.store(ip("1.1.1.1"), HANGZHOU.to_vec());
        cache.store(ip("2.2.2.2"), HANGZHOU.to_vec());
        cache.lookup(ip("1.1.1.1"));
        cache.store(ip("3.3.3.3"), HANGZHOU.to_vec());

        assert!(cache.lookup(ip("1.1.1.1")).is_some());
        assert!(cache.lookup(ip("2.2.2.2")).is_none());
        assert_eq!(cache.len(), 2);
    }
}
