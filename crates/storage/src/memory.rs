//! In-memory order store.
//!
//! Mirrors the replace semantics of the `PostgreSQL` store without a database.
//! An availability switch lets tests simulate an unreachable backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use orderflow_core::{Order, OrderUid};

use crate::{OrderStore, RepositoryError};

/// Order store kept in a process-local map.
#[derive(Debug)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderUid, Order>>,
    available: AtomicBool,
    saves: AtomicUsize,
    reads: AtomicUsize,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            saves: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail with [`RepositoryError::Unavailable`]
    /// (or succeed again when `available` is `true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of `get_order` calls that reached the map (hits and misses).
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "in-memory store switched off".to_owned(),
            ))
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.check_available()?;
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.order_uid.clone(), order.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_order(&self, order_uid: &OrderUid) -> Result<Order, RepositoryError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_uid)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use orderflow_core::fixtures::valid_order;

    #[tokio::test]
    async fn test_save_then_get_round_trips() {
        let store = MemoryOrderStore::new();
        let order = valid_order("ord-1");

        store.save_order(&order).await.unwrap();
        let loaded = store.get_order(&order.order_uid).await.unwrap();

        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_save_is_idempotent_and_replaces_items() {
        let store = MemoryOrderStore::new();
        let mut order = valid_order("ord-1");

        store.save_order(&order).await.unwrap();
        store.save_order(&order).await.unwrap();
        assert_eq!(store.len(), 1);

        order.items.truncate(1);
        order.items[0].name = "Replacement".to_owned();
        store.save_order(&order).await.unwrap();

        let loaded = store.get_order(&order.order_uid).await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "Replacement");
        assert_eq!(store.save_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let store = MemoryOrderStore::new();
        let err = store.get_order(&OrderUid::new("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryOrderStore::new();
        store.set_available(false);

        let order = valid_order("ord-1");
        assert!(matches!(
            store.save_order(&order).await,
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(store.ping().await.is_err());
        assert!(store.is_empty());

        store.set_available(true);
        store.save_order(&order).await.unwrap();
        assert!(store.ping().await.is_ok());
    }
}
