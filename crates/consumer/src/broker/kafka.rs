//! Kafka-backed [`MessageSource`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};

use super::{BrokerError, BrokerMessage, MessageSource};
use crate::config::KafkaSettings;

/// Upper bound for a blocking seek inside librdkafka.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer-group member reading one topic with manual commits.
pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    /// Create the client and subscribe to the configured topic.
    ///
    /// Auto-commit is off and the initial position for a new group is the
    /// earliest offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or subscribed.
    pub fn connect(settings: &KafkaSettings) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", settings.brokers.join(","))
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[settings.topic.as_str()])?;

        tracing::info!(
            brokers = %settings.brokers.join(","),
            topic = %settings.topic,
            group_id = %settings.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn fetch(&self) -> Result<BrokerMessage, BrokerError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        Ok(owned_message(&message))
    }

    async fn commit(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;

        // Synchronous commit blocks on a broker round trip.
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&offsets, CommitMode::Sync))
            .await
            .map_err(|e| BrokerError::Commit(e.to_string()))??;
        Ok(())
    }

    async fn rewind(&self, message: &BrokerMessage) -> Result<(), BrokerError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = message.topic.clone();
        let partition = message.partition;
        let offset = message.offset;

        tokio::task::spawn_blocking(move || {
            consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
        })
        .await
        .map_err(|e| BrokerError::Seek(e.to_string()))??;
        Ok(())
    }
}

fn owned_message(message: &BorrowedMessage<'_>) -> BrokerMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| {
                    (
                        header.key.to_owned(),
                        header.value.map(<[u8]>::to_vec).unwrap_or_default(),
                    )
                })
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    BrokerMessage {
        topic: message.topic().to_owned(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec).unwrap_or_default(),
        value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        headers,
    }
}
