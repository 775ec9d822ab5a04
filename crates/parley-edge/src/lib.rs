//! Parley public edge
//!
//! Stateless HTTP tier in front of the engine. Every mutating request must
//! carry the three signature headers; verification happens in middleware
//! before rate limiting, so only authenticated traffic consumes a caller's
//! window. Handlers translate between the public JSON surface and the
//! engine's binary RPC, carrying the correlation id both ways.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use error::{EdgeError, EdgeResult};
pub use state::EdgeState;

/// Create the edge router with all middleware.
pub fn create_router(state: Arc<EdgeState>) -> Router {
    let protected = Router::new()
        .route("/v1/negotiate", post(handlers::negotiate))
        .route("/v1/deals/:deal_id/status", post(handlers::deal_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let router = Router::new()
        .merge(protected)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .with_state(state);

    let x_request_id = HeaderName::from_static("x-request-id");
    router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}
