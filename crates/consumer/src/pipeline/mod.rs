//! The ingestion loop.
//!
//! Messages are handled strictly one at a time: fetch, decode, validate,
//! store or dead-letter, then commit. A message that could not be stored or
//! dead-lettered is left uncommitted, the source is rewound to it and the
//! loop backs off before fetching again, so the same message comes back.

mod retry;

use std::collections::HashMap;
use std::time::Duration;

use orderflow_core::{decode_order, validate_order};
use orderflow_storage::OrderStore;
use tokio::sync::watch;
use tracing::Instrument as _;

pub use retry::RetryPolicy;

use crate::broker::{BrokerMessage, MessagePosition, MessageSource};
use crate::dlq::{DeadLetterSink, ReasonCode};

/// Attempt counters kept before the map is reset. Only messages that keep
/// failing stay in the map, so this is reached only after a rebalance storm.
const MAX_TRACKED_ATTEMPTS: usize = 4096;

/// Timing knobs for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Upper bound for one `save_order` call.
    pub store_timeout: Duration,
    /// Upper bound for one offset commit.
    pub commit_timeout: Duration,
    /// Backoff after a failed attempt or fetch error.
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            commit_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The order was written to the store.
    Stored,
    /// The message was rejected and published to the dead-letter topic.
    DeadLettered(ReasonCode),
    /// The store failed or timed out; the message must be redelivered.
    StoreFailed,
    /// The message was rejected but publishing the dead letter failed.
    DeadLetterFailed(ReasonCode),
    /// The message was rejected and no dead-letter sink is configured.
    DeadLetterDisabled(ReasonCode),
}

impl Outcome {
    /// Whether the message is fully handled and its offset may be committed.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Stored | Self::DeadLettered(_))
    }
}

/// Result of [`Pipeline::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled {
    pub outcome: Outcome,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
    /// Whether the offset commit succeeded.
    pub committed: bool,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub stored: u64,
    pub dead_lettered: u64,
    /// Messages left uncommitted for redelivery.
    pub redelivered: u64,
    pub commit_failures: u64,
    pub fetch_errors: u64,
}

impl PipelineStats {
    fn record(&mut self, handled: &Handled) {
        match handled.outcome {
            Outcome::Stored => self.stored += 1,
            Outcome::DeadLettered(_) => self.dead_lettered += 1,
            Outcome::StoreFailed
            | Outcome::DeadLetterFailed(_)
            | Outcome::DeadLetterDisabled(_) => self.redelivered += 1,
        }
        if handled.outcome.is_final() && !handled.committed {
            self.commit_failures += 1;
        }
    }
}

/// Sequential consumer wiring a source, a store and an optional
/// dead-letter sink.
pub struct Pipeline<S, O, D> {
    source: S,
    store: O,
    dead_letters: Option<D>,
    settings: PipelineSettings,
    attempts: HashMap<MessagePosition, u32>,
}

impl<S, O, D> Pipeline<S, O, D>
where
    S: MessageSource,
    O: OrderStore,
    D: DeadLetterSink,
{
    /// `dead_letters: None` disables dead-lettering; rejected messages then
    /// stay uncommitted.
    pub fn new(source: S, store: O, dead_letters: Option<D>, settings: PipelineSettings) -> Self {
        if dead_letters.is_none() {
            tracing::warn!("dead-letter topic not configured; rejected messages will block");
        }
        Self {
            source,
            store,
            dead_letters,
            settings,
            attempts: HashMap::new(),
        }
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    pub const fn store(&self) -> &O {
        &self.store
    }

    /// Consume until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// A message already being handled is finished before the loop exits.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        let mut stats = PipelineStats::default();
        tracing::info!("ingestion loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                fetched = self.source.fetch() => fetched,
            };

            let keep_going = match fetched {
                Ok(message) => {
                    let handled = self.handle(&message).await;
                    stats.record(&handled);
                    handled.outcome.is_final() || self.settings.retry.pause(&mut shutdown).await
                }
                Err(err) => {
                    stats.fetch_errors += 1;
                    tracing::error!(error = %err, "fetch failed");
                    self.settings.retry.pause(&mut shutdown).await
                }
            };

            if !keep_going {
                break;
            }
        }

        tracing::info!(
            stored = stats.stored,
            dead_lettered = stats.dead_lettered,
            redelivered = stats.redelivered,
            commit_failures = stats.commit_failures,
            fetch_errors = stats.fetch_errors,
            "ingestion loop stopped"
        );
        stats
    }

    /// Process one message and commit it or rewind the source to it.
    pub async fn handle(&mut self, message: &BrokerMessage) -> Handled {
        let position = message.position();
        let attempt = self.attempts.get(&position).map_or(1, |n| n.saturating_add(1));

        let span = tracing::info_span!(
            "message",
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            key = %message.key_lossy(),
            attempt,
        );

        async {
            let outcome = self.process(message, attempt).await;

            if outcome.is_final() {
                self.attempts.remove(&position);
                let committed = self.commit(message).await;
                return Handled {
                    outcome,
                    attempt,
                    committed,
                };
            }

            if self.attempts.len() >= MAX_TRACKED_ATTEMPTS {
                self.attempts.clear();
            }
            self.attempts.insert(position, attempt);

            if let Err(err) = self.source.rewind(message).await {
                tracing::warn!(
                    error = %err,
                    "rewind failed; redelivery deferred to next rebalance"
                );
            }
            Handled {
                outcome,
                attempt,
                committed: false,
            }
        }
        .instrument(span)
        .await
    }

    /// Decode, validate and store or dead-letter one message. Never commits.
    pub async fn process(&self, message: &BrokerMessage, attempt: u32) -> Outcome {
        let order = match decode_order(&message.value) {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(error = %err, category = ?err.category(), "order decode failed");
                return self
                    .dead_letter(message, ReasonCode::UnmarshalFailed, attempt)
                    .await;
            }
        };

        if let Err(errors) = validate_order(&order) {
            tracing::warn!(
                order_uid = %order.order_uid,
                violations = errors.len(),
                error = %errors,
                "order validation failed"
            );
            return self
                .dead_letter(message, ReasonCode::ValidationFailed, attempt)
                .await;
        }

        match tokio::time::timeout(self.settings.store_timeout, self.store.save_order(&order))
            .await
        {
            Ok(Ok(())) => {
                tracing::info!(
                    order_uid = %order.order_uid,
                    items = order.items.len(),
                    "order stored"
                );
                Outcome::Stored
            }
            Ok(Err(err)) => {
                tracing::error!(order_uid = %order.order_uid, error = %err, "order store failed");
                Outcome::StoreFailed
            }
            Err(_) => {
                tracing::error!(
                    order_uid = %order.order_uid,
                    timeout_ms = self.settings.store_timeout.as_millis(),
                    "order store timed out"
                );
                Outcome::StoreFailed
            }
        }
    }

    async fn dead_letter(
        &self,
        message: &BrokerMessage,
        reason: ReasonCode,
        attempt: u32,
    ) -> Outcome {
        let Some(sink) = &self.dead_letters else {
            tracing::error!(
                reason = %reason,
                "rejected message left uncommitted; no dead-letter topic"
            );
            return Outcome::DeadLetterDisabled(reason);
        };

        match sink.send(message, reason, attempt).await {
            Ok(()) => Outcome::DeadLettered(reason),
            Err(err) => {
                tracing::error!(reason = %reason, error = %err, "dead-letter publish failed");
                Outcome::DeadLetterFailed(reason)
            }
        }
    }

    async fn commit(&self, message: &BrokerMessage) -> bool {
        match tokio::time::timeout(self.settings.commit_timeout, self.source.commit(message))
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "offset commit failed; message may be reprocessed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.commit_timeout.as_millis(),
                    "offset commit timed out; message may be reprocessed"
                );
                false
            }
        }
    }
}
