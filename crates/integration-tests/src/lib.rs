//! Integration tests for Orderflow.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process scenarios (no external services)
//! cargo test -p orderflow-integration-tests
//!
//! # Including tests against a live PostgreSQL and a running read API
//! TEST_DATABASE_URL=postgres://localhost/orderflow_test \
//! WEB_BASE_URL=http://localhost:4000 \
//!     cargo test -p orderflow-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `pipeline_scenarios` - Ingestion against an in-memory broker and store
//! - `read_api` - The HTTP read path over an in-memory store
//! - `postgres_store` - `PgOrderStore` against a real database (ignored)
//! - `live_smoke` - HTTP checks against a running server (ignored)
//!
//! This library holds the shared fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use orderflow_consumer::{
    BrokerError, BrokerMessage, DeadLetterError, MessageSource, OutgoingRecord, RecordPublisher,
};
use tokio::sync::Notify;

pub const TOPIC: &str = "orders";

/// One-partition log with a consumer cursor and a committed offset.
///
/// `fetch` reads at the cursor and waits when the log is exhausted,
/// `commit` records the next offset to resume from, and `rewind` moves the
/// cursor back like a partition seek. [`restart`](Self::restart) simulates a
/// consumer restart by resuming from the committed offset.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<LogState>,
    appended: Notify,
}

#[derive(Default)]
struct LogState {
    log: Vec<BrokerMessage>,
    cursor: usize,
    committed: i64,
    commit_count: usize,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and return its offset.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = {
            let mut state = self.state.lock().unwrap();
            let offset = i64::try_from(state.log.len()).unwrap();
            let message =
                BrokerMessage::new(TOPIC, 0, offset, payload.into()).with_key(format!("k{offset}"));
            state.log.push(message);
            offset
        };
        self.appended.notify_one();
        offset
    }

    /// Next offset a restarted consumer would read.
    pub fn committed(&self) -> i64 {
        self.state.lock().unwrap().committed
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commit_count
    }

    /// Offset the next fetch will return.
    pub fn cursor(&self) -> usize {
        self.state.lock().unwrap().cursor
    }

    /// Resume from the committed offset, as after a crash.
    pub fn restart(&self) {
        let mut state = self.state.lock().unwrap();
        state.cursor = usize::try_from(state.committed).unwrap();
    }

    fn try_next(&self) -> Option<BrokerMessage> {
        let mut state = self.state.lock().unwrap();
        let message = state.log.get(state.cursor).cloned()?;
        state.cursor += 1;
        Some(message)
    }
}

#[async_trait]
impl MessageSource for InMemoryBroker {
    async fn fetch(&self) -> Result<BrokerMessage, BrokerError> {
        loop {
            if let Some(message) = self.try_next() {
                return Ok(message);
            }
            self.appended.notified().await;
        }
    }

    async fn commit(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.committed = state.committed.max(message.offset + 1);
        state.commit_count += 1;
        Ok(())
    }

    async fn rewind(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.cursor = usize::try_from(message.offset)
            .map_err(|e| BrokerError::Seek(e.to_string()))?;
        Ok(())
    }
}

/// Dead-letter publisher that keeps every record and can be switched off.
#[derive(Default)]
pub struct CollectingPublisher {
    records: Mutex<Vec<OutgoingRecord>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl CollectingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<OutgoingRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Publish calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordPublisher for CollectingPublisher {
    async fn publish(&self, record: OutgoingRecord) -> Result<(), DeadLetterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeadLetterError::Publish("dead-letter broker unreachable".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}
