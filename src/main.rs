// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{info, warn};

use geogate_server::{
    api::router,
    config::Config,
    gateway::ShopFeedClient,
    geo::IpApiClient,
    state::AppState,
    storage::CredentialStore,
    telemetry::{init_tracing, redact},
};

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    let credentials = CredentialStore::open(&config.credentials_db_path())?;
    for key in &config.seed_keys {
        if credentials.provision(key)? {
            info!(key = %redact(key), "provisioned seed key");
        }
    }

    let geo_lookup = Arc::new(IpApiClient::new(config.geo_api_url.clone(), config.upstream_timeout)?);
    let rounds = Arc::new(ShopFeedClient::new(
        config.feeds.products.clone(),
        config.feeds.round.clone(),
        config.upstream_timeout,
    )?);

    let addr: SocketAddr = config.bind_address().parse()?;
    let tls = config.tls.clone();

    let state = AppState::new(config, credentials, geo_lookup, rounds);
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match tls {
        Some(paths) => {
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key).await?;
            info!(%addr, "listening on https");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            warn!(%addr, "TLS not configured, listening on plain http");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
