//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store does not answer in time.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match tokio::time::timeout(state.lookup_timeout(), state.store().ping()).await {
        Ok(Ok(())) => StatusCode::OK,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(_) => {
            tracing::warn!("readiness check timed out");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
