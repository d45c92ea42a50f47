//! Bounded LRU cache with per-entry TTL.
//!
//! Entries live in a slab of index-linked nodes forming the recency list
//! (head = most recently used) plus a key → slot map. Both are mutated under
//! one mutex so a lookup and its promotion are a single step.
//!
//! Expiry is lazy: an expired entry is removed when it is read, or when it
//! reaches the tail and is evicted. There is no background sweeper.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Thread-safe LRU cache with a fixed TTL applied on every insert.
#[derive(Debug)]
pub struct LruCache<K, V> {
    inner: Mutex<Slab<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries, each living `ttl`.
    ///
    /// A capacity of 0 means unbounded; a TTL of zero disables expiry.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Slab::with_capacity(capacity.min(4096))),
            capacity,
            ttl,
        }
    }

    /// Look up `key`, promoting it to most recently used.
    ///
    /// Returns `None` on a miss, including when the entry has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut slab = self.lock();
        let idx = *slab.map.get(key)?;

        if slab.node(idx).is_some_and(|node| node.is_expired(now)) {
            slab.remove(idx);
            return None;
        }

        slab.promote(idx);
        slab.node(idx).map(|node| node.value.clone())
    }

    /// Insert or replace `key`, resetting its expiry and promoting it.
    ///
    /// Inserting a new key into a full cache evicts the least recently used
    /// entry first.
    pub fn set(&self, key: K, value: V) {
        let expires_at = self.expiry_from(Instant::now());
        let mut slab = self.lock();

        if let Some(&idx) = slab.map.get(&key) {
            if let Some(node) = slab.node_mut(idx) {
                node.value = value;
                node.expires_at = expires_at;
            }
            slab.promote(idx);
            return;
        }

        if self.capacity > 0 && slab.map.len() >= self.capacity {
            slab.evict_lru();
        }
        slab.insert_front(key, value, expires_at);
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn delete(&self, key: &K) -> bool {
        let mut slab = self.lock();
        match slab.map.get(key) {
            Some(&idx) => {
                slab.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn purge(&self) {
        self.lock().clear();
    }

    /// Number of entries, counting expired ones not yet reclaimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries; 0 means unbounded.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A TTL too large to represent as an instant never expires.
    fn expiry_from(&self, now: Instant) -> Option<Instant> {
        if self.ttl.is_zero() {
            None
        } else {
            now.checked_add(self.ttl)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slab<K, V>> {
        // Every mutation leaves the list consistent, so a poisoned lock is safe to reuse.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct Slab<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    map: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> Slab<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            map: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn insert_front(&mut self, key: K, value: V, expires_at: Option<Instant>) {
        let node = Node {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: None,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                if let Some(slot) = self.slots.get_mut(idx) {
                    *slot = Some(node);
                }
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.map.insert(key, idx);
        self.link_front(idx);
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    fn evict_lru(&mut self) {
        if let Some(tail) = self.tail {
            self.remove(tail);
        }
    }

    fn remove(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(node) = self.slots.get_mut(idx).and_then(Option::take) {
            self.map.remove(&node.key);
            self.free.push(idx);
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.map.clear();
        self.head = None;
        self.tail = None;
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => {
                if let Some(head) = self.node_mut(head) {
                    head.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.node(idx).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(prev_node) = self.node_mut(p) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(next_node) = self.node_mut(n) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_hits() {
        let cache = LruCache::new(2, TTL);
        cache.set("a", 1);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_least_recently_used() {
        let cache = LruCache::new(2, TTL);
        cache.set("a", 1);
        cache.set("b", 2);

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_refreshes_value_and_recency() {
        let cache = LruCache::new(2, TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = LruCache::new(10, TTL);
        cache.set("a", 1);

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_resets_expiry() {
        let cache = LruCache::new(10, TTL);
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(20)).await;
        cache.set("a", 2);
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let cache = LruCache::new(10, Duration::ZERO);
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(86_400)).await;

        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_never_expires() {
        let cache = LruCache::new(10, Duration::MAX);
        cache.set("a", 1);
        tokio::time::advance(Duration::from_secs(86_400)).await;

        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_is_unbounded() {
        let cache = LruCache::new(0, TTL);
        for i in 0..1000 {
            cache.set(i, i * 2);
        }

        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.get(&0), Some(0));
        assert_eq!(cache.get(&999), Some(1998));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_purge() {
        let cache = LruCache::new(4, TTL);
        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.delete(&"a"));
        assert!(!cache.delete(&"a"));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);

        cache.purge();
        assert!(cache.is_empty());
        cache.set("c", 3);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_reused_after_eviction() {
        let cache = LruCache::new(3, TTL);
        for i in 0..100 {
            cache.set(i, i);
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.lock().slots.len() <= 3);
        assert_eq!(cache.get(&97), Some(97));
        assert_eq!(cache.get(&98), Some(98));
        assert_eq!(cache.get(&99), Some(99));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slot_cache() {
        let cache = LruCache::new(1, TTL);
        cache.set("a", 1);
        cache.set("b", 2);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        cache.set("b", 3);
        assert_eq!(cache.get(&"b"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_access() {
        let cache = std::sync::Arc::new(LruCache::new(64, TTL));
        let mut tasks = Vec::new();
        for t in 0..8 {
            let cache = std::sync::Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                for i in 0..200 {
                    cache.set((t, i % 16), i);
                    let _ = cache.get(&(t, (i + 1) % 16));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(cache.len() <= 64);
    }
}
