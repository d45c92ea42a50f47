//! Dead-letter routing for messages that can never be stored.
//!
//! A rejected message is wrapped in an [`Envelope`] that keeps the original
//! bytes (base64) and its log position, then published to the dead-letter
//! topic. The record key is `topic:partition:offset`, so republishing after
//! a crash yields a duplicate with the same key that downstream tooling can
//! collapse.

#[cfg(feature = "kafka")]
pub mod kafka;

use core::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broker::BrokerMessage;

/// Header carrying the [`ReasonCode`].
pub const REASON_HEADER: &str = "x-dlq-reason";
/// Header carrying the source topic.
pub const ORIGINAL_TOPIC_HEADER: &str = "x-original-topic";
/// Default upper bound for one dead-letter publish.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(7);

/// Why a message was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The payload is not a well-formed order document.
    UnmarshalFailed,
    /// The order decoded but broke one or more business rules.
    ValidationFailed,
}

impl ReasonCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnmarshalFailed => "unmarshal_failed",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while dead-lettering.
#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("failed to encode dead-letter envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("dead-letter publish failed: {0}")]
    Publish(String),

    #[error("dead-letter publish timed out after {0:?}")]
    Timeout(Duration),

    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// JSON document published to the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub original_topic: String,
    pub original_partition: i32,
    pub original_offset: i64,
    /// Original record key as text.
    pub key: String,
    pub reason: ReasonCode,
    /// Delivery attempt that gave up on the message, starting at 1.
    pub attempt: u32,
    /// Original payload bytes.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    #[must_use]
    pub fn capture(
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            original_topic: message.topic.clone(),
            original_partition: message.partition,
            original_offset: message.offset,
            key: message.key_lossy(),
            reason,
            attempt,
            payload: message.value.clone(),
            timestamp: now,
        }
    }
}

/// A record ready to be written to the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRecord {
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutgoingRecord {
    /// Look up a header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_slice())
    }
}

/// Low-level publish to the dead-letter topic.
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Publish one record and wait for the broker acknowledgement.
    async fn publish(&self, record: OutgoingRecord) -> Result<(), DeadLetterError>;
}

/// Where the pipeline sends messages it cannot store.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(
        &self,
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
    ) -> Result<(), DeadLetterError>;
}

/// Wraps rejected messages in an [`Envelope`] and publishes them.
#[derive(Debug)]
pub struct DeadLetterRouter<P> {
    publisher: P,
    timeout: Duration,
}

impl<P: RecordPublisher> DeadLetterRouter<P> {
    #[must_use]
    pub const fn new(publisher: P) -> Self {
        Self {
            publisher,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Override the publish timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Build the record for `message` without publishing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized.
    pub fn record_for(
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Result<OutgoingRecord, DeadLetterError> {
        let envelope = Envelope::capture(message, reason, attempt, now);
        Ok(OutgoingRecord {
            key: message.position().to_string().into_bytes(),
            payload: serde_json::to_vec(&envelope)?,
            headers: vec![
                (REASON_HEADER.to_owned(), reason.as_str().as_bytes().to_vec()),
                (
                    ORIGINAL_TOPIC_HEADER.to_owned(),
                    message.topic.as_bytes().to_vec(),
                ),
            ],
        })
    }
}

#[async_trait]
impl<P: RecordPublisher> DeadLetterSink for DeadLetterRouter<P> {
    async fn send(
        &self,
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
    ) -> Result<(), DeadLetterError> {
        let record = Self::record_for(message, reason, attempt, Utc::now())?;

        tokio::time::timeout(self.timeout, self.publisher.publish(record))
            .await
            .map_err(|_| DeadLetterError::Timeout(self.timeout))??;

        tracing::info!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            reason = %reason,
            attempt,
            "message dead-lettered"
        );
        Ok(())
    }
}

#[async_trait]
impl<T: RecordPublisher + ?Sized> RecordPublisher for std::sync::Arc<T> {
    async fn publish(&self, record: OutgoingRecord) -> Result<(), DeadLetterError> {
        (**self).publish(record).await
    }
}

#[async_trait]
impl<T: DeadLetterSink + ?Sized> DeadLetterSink for std::sync::Arc<T> {
    async fn send(
        &self,
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
    ) -> Result<(), DeadLetterError> {
        (**self).send(message, reason, attempt).await
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct CapturingPublisher {
        records: Mutex<Vec<OutgoingRecord>>,
    }

    #[async_trait]
    impl RecordPublisher for CapturingPublisher {
        async fn publish(&self, record: OutgoingRecord) -> Result<(), DeadLetterError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    struct StalledPublisher;

    #[async_trait]
    impl RecordPublisher for StalledPublisher {
        async fn publish(&self, _record: OutgoingRecord) -> Result<(), DeadLetterError> {
            std::future::pending().await
        }
    }

    fn message() -> BrokerMessage {
        BrokerMessage::new("orders", 2, 17, b"{\"bogus\":1}".to_vec()).with_key("ord-1")
    }

    #[test]
    fn test_reason_codes_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReasonCode::UnmarshalFailed).unwrap(),
            "\"unmarshal_failed\""
        );
        assert_eq!(ReasonCode::ValidationFailed.to_string(), "validation_failed");
    }

    #[test]
    fn test_envelope_encodes_payload_as_base64() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let envelope = Envelope::capture(&message(), ReasonCode::UnmarshalFailed, 1, now);
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["original_topic"], "orders");
        assert_eq!(json["original_partition"], 2);
        assert_eq!(json["original_offset"], 17);
        assert_eq!(json["key"], "ord-1");
        assert_eq!(json["reason"], "unmarshal_failed");
        assert_eq!(json["attempt"], 1);
        assert_eq!(json["payload"], "eyJib2d1cyI6MX0=");

        let decoded: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.payload, b"{\"bogus\":1}");
    }

    #[tokio::test]
    async fn test_router_publishes_keyed_record_with_headers() {
        let router = DeadLetterRouter::new(CapturingPublisher::default());

        router
            .send(&message(), ReasonCode::ValidationFailed, 3)
            .await
            .unwrap();

        let records = router.publisher().records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.key, b"orders:2:17");
        assert_eq!(record.header(REASON_HEADER), Some(&b"validation_failed"[..]));
        assert_eq!(record.header(ORIGINAL_TOPIC_HEADER), Some(&b"orders"[..]));

        let envelope: Envelope = serde_json::from_slice(&record.payload).unwrap();
        assert_eq!(envelope.attempt, 3);
        assert_eq!(envelope.reason, ReasonCode::ValidationFailed);
        assert_eq!(envelope.original_offset, 17);
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_times_out_stalled_publish() {
        let router =
            DeadLetterRouter::new(StalledPublisher).with_timeout(Duration::from_secs(7));

        let err = router
            .send(&message(), ReasonCode::UnmarshalFailed, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, DeadLetterError::Timeout(d) if d == Duration::from_secs(7)));
    }
}
