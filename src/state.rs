// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{IntegrityVerifier, SessionIssuer};
use crate::config::Config;
use crate::crypto::EnvelopeCodec;
use crate::gateway::{Dispatcher, RoundSource};
use crate::geo::{GeoLookup, GeoResolver};
use crate::storage::{CredentialStore, GeoCache};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub geo: GeoResolver,
    pub sessions: Arc<SessionIssuer>,
    pub integrity: Arc<IntegrityVerifier>,
    pub envelope: Arc<EnvelopeCodec>,
    pub gateway: Arc<Dispatcher>,
}

impl AppState {
    /// Wire every component from `config`.
    ///
    /// The outbound collaborators are passed in so tests can stub them.
    pub fn new(
        config: Config,
        credentials: CredentialStore,
        geo_lookup: Arc<dyn GeoLookup>,
        rounds: Arc<dyn RoundSource>,
    ) -> Self {
        let geo_cache = Arc::new(GeoCache::new(config.geo_cache_capacity, config.geo_cache_ttl));

        Self {
            credentials: Arc::new(credentials),
            geo: GeoResolver::new(geo_cache, geo_lookup),
            sessions: Arc::new(SessionIssuer::new(
                config.session_secret.as_bytes(),
                config.session_lifetime,
            )),
            integrity: Arc::new(IntegrityVerifier::new(
                config.integrity_secret.as_bytes(),
                config.integrity_skew,
            )),
            envelope: Arc::new(EnvelopeCodec::new(config.envelope_mode, config.pbkdf2_iterations)),
            gateway: Arc::new(Dispatcher::new(
                config.feeds.clone(),
                config.client_secrets.clone(),
                rounds,
            )),
            config: Arc::new(config),
        }
    }
}
