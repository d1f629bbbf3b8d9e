// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info_span, Span};

use crate::{auth::require_integrity, state::AppState};

pub mod gateway;
pub mod health;
pub mod validate;

pub const GATEWAY_PATH: &str = "/api/v1/gateway";

pub fn router(state: AppState) -> Router {
    // Integrity runs as a route layer so it sees the full request path
    // and only fires for matched routes.
    let protected = Router::new()
        .route(GATEWAY_PATH, post(gateway::gateway))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_integrity));

    Router::new()
        .route("/validate", post(validate::validate))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(protected)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
