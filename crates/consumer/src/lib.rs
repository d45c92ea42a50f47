//! Orderflow Consumer - ingestion from the order stream.
//!
//! # Flow
//!
//! ```text
//! broker ──fetch──▶ decode ──▶ validate ──▶ save_order ──▶ commit
//!                     │            │            │
//!                     ▼            ▼            ▼
//!                dead-letter  dead-letter   no commit, rewind,
//!                 + commit     + commit     backoff, redeliver
//! ```
//!
//! Delivery is at-least-once. Correctness under redelivery comes from the
//! idempotent [`OrderStore::save_order`](orderflow_storage::OrderStore) upsert;
//! an offset is committed only after the message is durably stored or
//! deliberately dead-lettered.
//!
//! # Modules
//!
//! - [`broker`] - The `MessageSource` capability and owned message type
//! - [`dlq`] - Dead-letter envelope and router
//! - [`pipeline`] - The sequential consume loop and its retry policy
//! - [`config`] - Environment-driven configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod broker;
pub mod config;
pub mod dlq;
pub mod pipeline;

pub use broker::{BrokerError, BrokerMessage, MessagePosition, MessageSource};
pub use config::{ConfigError, ConsumerConfig, LogFormat};
pub use dlq::{
    DeadLetterError, DeadLetterRouter, DeadLetterSink, Envelope, OutgoingRecord, ReasonCode,
    RecordPublisher,
};
pub use pipeline::{Handled, Outcome, Pipeline, PipelineSettings, PipelineStats, RetryPolicy};
