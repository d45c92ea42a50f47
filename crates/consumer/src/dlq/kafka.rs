//! Kafka-backed [`RecordPublisher`].

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::{DEFAULT_PUBLISH_TIMEOUT, DeadLetterError, OutgoingRecord, RecordPublisher};

/// Publishes dead-letter records to one topic, waiting for all in-sync
/// replicas to acknowledge.
pub struct KafkaRecordPublisher {
    producer: FutureProducer,
    topic: String,
    queue_timeout: Duration,
}

impl KafkaRecordPublisher {
    /// Create a producer for `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer cannot be created.
    pub fn connect(brokers: &[String], topic: impl Into<String>) -> Result<Self, DeadLetterError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set(
                "message.timeout.ms",
                DEFAULT_PUBLISH_TIMEOUT.as_millis().to_string(),
            )
            .create()?;

        let topic = topic.into();
        tracing::info!(topic = %topic, "dead-letter producer ready");

        Ok(Self {
            producer,
            topic,
            queue_timeout: DEFAULT_PUBLISH_TIMEOUT,
        })
    }
}

#[async_trait]
impl RecordPublisher for KafkaRecordPublisher {
    async fn publish(&self, record: OutgoingRecord) -> Result<(), DeadLetterError> {
        let headers = record
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, (key, value)| {
                headers.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_slice()),
                })
            });

        let future_record = FutureRecord::to(&self.topic)
            .key(record.key.as_slice())
            .payload(record.payload.as_slice())
            .headers(headers);

        self.producer
            .send(future_record, Timeout::After(self.queue_timeout))
            .await
            .map(|_| ())
            .map_err(|(err, _)| DeadLetterError::Kafka(err))
    }
}
