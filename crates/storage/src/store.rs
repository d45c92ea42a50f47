//! The storage capability used by the pipeline and the read API.

use std::sync::Arc;

use async_trait::async_trait;
use orderflow_core::{Order, OrderUid};

use crate::RepositoryError;

/// Durable order storage.
///
/// `save_order` is an idempotent full replacement: saving the same order twice
/// leaves the same state as saving it once, and saving a changed order leaves
/// no trace of the previous item set.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or fully replace an order atomically.
    ///
    /// # Errors
    ///
    /// Any error means nothing was written.
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Load a complete order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no order has this id; other
    /// variants for connectivity or data problems.
    async fn get_order(&self, order_uid: &OrderUid) -> Result<Order, RepositoryError>;

    /// Cheap connectivity probe for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve requests.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        (**self).save_order(order).await
    }

    async fn get_order(&self, order_uid: &OrderUid) -> Result<Order, RepositoryError> {
        (**self).get_order(order_uid).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        (**self).ping().await
    }
}
