//! Order lookup through the read-through cache.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use orderflow_core::{Order, OrderUid};
use orderflow_storage::RepositoryError;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Response header naming where the body came from.
pub const SOURCE_HEADER: &str = "x-source";

/// Longest order id accepted in a path.
pub const MAX_ORDER_UID_LEN: usize = 128;

/// Where an order response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Db,
    /// No order was returned (not found or failed).
    Miss,
}

impl Source {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Db => "db",
            Self::Miss => "miss",
        }
    }
}

/// `GET /order/{order_uid}`
pub async fn show(State(state): State<AppState>, Path(raw_uid): Path<String>) -> Response {
    match lookup(&state, &raw_uid).await {
        Ok((order, source)) => {
            ([(SOURCE_HEADER, source.as_str())], Json(order.as_ref())).into_response()
        }
        Err(err) => ([(SOURCE_HEADER, Source::Miss.as_str())], err).into_response(),
    }
}

/// Serve from the cache, else load from the store and populate the cache.
async fn lookup(state: &AppState, raw_uid: &str) -> Result<(Arc<Order>, Source)> {
    let order_uid = parse_order_uid(raw_uid)?;

    if let Some(order) = state.cache().get(&order_uid) {
        tracing::debug!(order_uid = %order_uid, "cache hit");
        return Ok((order, Source::Cache));
    }

    let loaded = tokio::time::timeout(state.lookup_timeout(), state.store().get_order(&order_uid))
        .await
        .map_err(|_| AppError::Timeout)?;

    let order = match loaded {
        Ok(order) => Arc::new(order),
        Err(RepositoryError::NotFound) => {
            tracing::debug!(order_uid = %order_uid, "order not found");
            return Err(AppError::NotFound("order".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    state.cache().set(order_uid, Arc::clone(&order));
    Ok((order, Source::Db))
}

fn parse_order_uid(raw: &str) -> Result<OrderUid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("order id must not be blank".to_string()));
    }
    if trimmed.len() > MAX_ORDER_UID_LEN {
        return Err(AppError::BadRequest(format!(
            "order id must be at most {MAX_ORDER_UID_LEN} bytes"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(AppError::BadRequest(
            "order id must not contain control characters".to_string(),
        ));
    }
    Ok(OrderUid::new(trimmed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_uid() {
        assert_eq!(parse_order_uid(" ord-1 ").unwrap().as_str(), "ord-1");
        assert!(parse_order_uid("   ").is_err());
        assert!(parse_order_uid(&"a".repeat(129)).is_err());
        assert!(parse_order_uid(&"a".repeat(128)).is_ok());
        assert!(parse_order_uid("ord\u{7}1").is_err());
    }
}
