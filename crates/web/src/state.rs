//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use orderflow_core::{Order, OrderUid};
use orderflow_storage::OrderStore;

use crate::cache::LruCache;
use crate::config::CacheSettings;

/// Cached orders are shared, never mutated.
pub type OrderCache = LruCache<OrderUid, Arc<Order>>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the order store and the read-through cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn OrderStore>,
    cache: OrderCache,
    lookup_timeout: Duration,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Backing order store
    /// * `cache` - Read-through cache sizing
    /// * `lookup_timeout` - Upper bound on a store lookup after a cache miss
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, cache: CacheSettings, lookup_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                cache: LruCache::new(cache.capacity, cache.ttl),
                lookup_timeout,
            }),
        }
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn store(&self) -> &dyn OrderStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the read-through cache.
    #[must_use]
    pub fn cache(&self) -> &OrderCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        self.inner.lookup_timeout
    }
}
