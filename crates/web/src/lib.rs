//! Orderflow Web - cached read API over stored orders.
//!
//! # Architecture
//!
//! - Axum router sharing one [`AppState`] across handlers
//! - [`cache::LruCache`] in front of the [`OrderStore`](orderflow_storage::OrderStore)
//! - Every response carries `x-request-id`; order responses carry `x-source`
//!
//! The cache is never the system of record: misses go to the store and
//! successful reads populate the cache.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use config::{CacheSettings, ConfigError, LogFormat, WebConfig};
pub use error::AppError;
pub use state::AppState;

/// Build the full application: routes, request tracing, request ids,
/// the request timeout and the Sentry layers.
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    routes::routes()
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
