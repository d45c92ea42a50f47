//! HTTP route handlers for the read API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /order/{order_uid}      - Order by id (X-Source: cache | db | miss)
//! GET  /healthz                - Liveness
//! GET  /health/ready           - Readiness (store ping)
//! ```

pub mod health;
pub mod orders;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create all routes for the read API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/order/{order_uid}", get(orders::show))
        .route("/healthz", get(health::health))
        .route("/health/ready", get(health::readiness))
}
