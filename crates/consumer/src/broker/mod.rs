//! Message broker capability.
//!
//! The pipeline only sees [`MessageSource`]; the Kafka adapter lives in
//! [`kafka`] behind the `kafka` feature so the pipeline builds and tests
//! without librdkafka.

#[cfg(feature = "kafka")]
pub mod kafka;

use core::fmt;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Errors raised by a broker adapter.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or returned a transient error.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// Committing an offset failed.
    #[error("offset commit failed: {0}")]
    Commit(String),

    /// Repositioning the consumer failed.
    #[error("seek failed: {0}")]
    Seek(String),

    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Where a message sits in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for MessagePosition {
    /// `topic:partition:offset`, also used as the dead-letter record key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.topic, self.partition, self.offset)
    }
}

/// A message fetched from the broker, copied out of the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Record key; empty when the producer set none.
    pub key: Vec<u8>,
    /// Raw record payload.
    pub value: Vec<u8>,
    pub timestamp: Option<DateTime<Utc>>,
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl BrokerMessage {
    /// Build a message with no key, timestamp or headers.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: Vec::new(),
            value,
            timestamp: None,
            headers: BTreeMap::new(),
        }
    }

    /// Set the record key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn position(&self) -> MessagePosition {
        MessagePosition {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }

    /// The key as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Source of order messages with manual offset control.
///
/// Implementations must not advance the committed position on their own;
/// the pipeline calls [`commit`](Self::commit) once a message is durably
/// handled and [`rewind`](Self::rewind) when it must be delivered again.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next message.
    ///
    /// Must be cancel-safe: the pipeline drops this future on shutdown.
    async fn fetch(&self) -> Result<BrokerMessage, BrokerError>;

    /// Commit the position just past `message`.
    async fn commit(&self, message: &BrokerMessage) -> Result<(), BrokerError>;

    /// Reposition so that `message` is the next one fetched.
    async fn rewind(&self, message: &BrokerMessage) -> Result<(), BrokerError>;
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for std::sync::Arc<T> {
    async fn fetch(&self) -> Result<BrokerMessage, BrokerError> {
        (**self).fetch().await
    }

    async fn commit(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        (**self).commit(message).await
    }

    async fn rewind(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        (**self).rewind(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display_is_dead_letter_key() {
        let message = BrokerMessage::new("orders", 3, 42, b"{}".to_vec());
        assert_eq!(message.position().to_string(), "orders:3:42");
    }

    #[test]
    fn test_key_lossy() {
        let message = BrokerMessage::new("orders", 0, 0, Vec::new()).with_key("ord-1");
        assert_eq!(message.key_lossy(), "ord-1");

        let binary = BrokerMessage::new("orders", 0, 0, Vec::new()).with_key(vec![0xff, b'a']);
        assert_eq!(binary.key_lossy(), "\u{fffd}a");
    }
}
