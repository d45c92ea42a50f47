//! End-to-end ingestion scenarios against an in-memory broker, store and
//! dead-letter publisher.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use orderflow_consumer::dlq::{ORIGINAL_TOPIC_HEADER, REASON_HEADER};
use orderflow_consumer::{
    DeadLetterRouter, Envelope, MessageSource, Outcome, Pipeline, PipelineSettings, ReasonCode,
};
use orderflow_core::fixtures::{valid_order, valid_order_json};
use orderflow_core::{Item, OrderUid};
use orderflow_integration_tests::{CollectingPublisher, InMemoryBroker, TOPIC};
use orderflow_storage::{MemoryOrderStore, OrderStore};
use tokio::sync::watch;

type Harness = Pipeline<
    Arc<InMemoryBroker>,
    Arc<MemoryOrderStore>,
    DeadLetterRouter<Arc<CollectingPublisher>>,
>;

struct Fixture {
    broker: Arc<InMemoryBroker>,
    store: Arc<MemoryOrderStore>,
    dlq: Arc<CollectingPublisher>,
    pipeline: Harness,
}

fn fixture() -> Fixture {
    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(MemoryOrderStore::new());
    let dlq = Arc::new(CollectingPublisher::new());
    let pipeline = Pipeline::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        Some(DeadLetterRouter::new(Arc::clone(&dlq))),
        PipelineSettings::default(),
    );
    Fixture {
        broker,
        store,
        dlq,
        pipeline,
    }
}

/// Fetch and handle exactly one message.
async fn step(fx: &mut Fixture) -> orderflow_consumer::Handled {
    let message = fx.broker.fetch().await.unwrap();
    fx.pipeline.handle(&message).await
}

#[tokio::test]
async fn test_unknown_field_is_dead_lettered_committed_and_skipped() {
    let mut fx = fixture();
    let mut payload: serde_json::Value =
        serde_json::from_slice(&valid_order_json("ord-unknown")).unwrap();
    payload["gift_wrap"] = serde_json::Value::Bool(true);
    fx.broker.publish(serde_json::to_vec(&payload).unwrap());
    fx.broker.publish(valid_order_json("ord-next"));

    let first = step(&mut fx).await;
    assert_eq!(first.outcome, Outcome::DeadLettered(ReasonCode::UnmarshalFailed));
    assert!(first.committed);
    assert_eq!(fx.broker.committed(), 1);

    let records = fx.dlq.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, b"orders:0:0");
    assert_eq!(records[0].header(REASON_HEADER), Some(&b"unmarshal_failed"[..]));
    assert_eq!(records[0].header(ORIGINAL_TOPIC_HEADER), Some(TOPIC.as_bytes()));
    let envelope: Envelope = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(envelope.payload, serde_json::to_vec(&payload).unwrap());
    assert_eq!(envelope.key, "k0");
    assert_eq!(envelope.attempt, 1);

    let second = step(&mut fx).await;
    assert_eq!(second.outcome, Outcome::Stored);
    assert_eq!(fx.broker.committed(), 2);
    assert!(fx.store.get_order(&OrderUid::new("ord-next")).await.is_ok());
    assert!(fx.store.get_order(&OrderUid::new("ord-unknown")).await.is_err());
}

#[tokio::test]
async fn test_empty_items_is_dead_lettered_as_validation_failure() {
    let mut fx = fixture();
    let mut order = valid_order("ord-empty");
    order.items.clear();
    order.payment.goods_total = 0;
    order.payment.amount = order.payment.delivery_cost + order.payment.custom_fee;
    fx.broker.publish(serde_json::to_vec(&order).unwrap());

    let handled = step(&mut fx).await;

    assert_eq!(handled.outcome, Outcome::DeadLettered(ReasonCode::ValidationFailed));
    assert!(handled.committed);
    assert!(fx.store.is_empty());
    let records = fx.dlq.records();
    assert_eq!(records[0].header(REASON_HEADER), Some(&b"validation_failed"[..]));
}

#[tokio::test]
async fn test_database_outage_keeps_message_until_stored() {
    let mut fx = fixture();
    fx.broker.publish(valid_order_json("ord-outage"));
    fx.store.set_available(false);

    let first = step(&mut fx).await;
    assert_eq!(first.outcome, Outcome::StoreFailed);
    assert!(!first.committed);
    assert_eq!(fx.broker.committed(), 0);
    // Rewound: the same message is next in line
    assert_eq!(fx.broker.cursor(), 0);

    let second = step(&mut fx).await;
    assert_eq!(second.outcome, Outcome::StoreFailed);
    assert_eq!(second.attempt, 2);

    fx.store.set_available(true);
    let third = step(&mut fx).await;
    assert_eq!(third.outcome, Outcome::Stored);
    assert!(third.committed);
    assert_eq!(fx.broker.committed(), 1);
    assert_eq!(fx.store.save_count(), 1);
    assert!(fx.dlq.records().is_empty());
}

#[tokio::test]
async fn test_dead_letter_failure_blocks_commit_and_is_retried() {
    let mut fx = fixture();
    fx.broker.publish(b"{not json".to_vec());
    fx.dlq.set_failing(true);

    let first = step(&mut fx).await;
    assert_eq!(first.outcome, Outcome::DeadLetterFailed(ReasonCode::UnmarshalFailed));
    assert!(!first.committed);
    assert_eq!(fx.broker.committed(), 0);

    // A crash here would resume from the same message
    fx.broker.restart();
    fx.dlq.set_failing(false);

    let second = step(&mut fx).await;
    assert_eq!(second.outcome, Outcome::DeadLettered(ReasonCode::UnmarshalFailed));
    assert!(second.committed);
    assert_eq!(fx.dlq.attempts(), 2);

    let envelope: Envelope = serde_json::from_slice(&fx.dlq.records()[0].payload).unwrap();
    assert_eq!(envelope.attempt, 2);
    assert_eq!(envelope.original_offset, 0);
}

#[tokio::test]
async fn test_resend_replaces_previous_version() {
    let mut fx = fixture();
    let original = valid_order("ord-resend");
    fx.broker.publish(serde_json::to_vec(&original).unwrap());

    let mut revised = original.clone();
    revised.items.truncate(1);
    let replacement = Item {
        rid: "ord-resend-rid-9".to_owned(),
        name: "Replacement".to_owned(),
        ..revised.items[0].clone()
    };
    revised.items.push(replacement);
    revised.payment.goods_total = revised.items_total().unwrap();
    revised.payment.amount =
        revised.payment.goods_total + revised.payment.delivery_cost + revised.payment.custom_fee;
    fx.broker.publish(serde_json::to_vec(&revised).unwrap());

    assert_eq!(step(&mut fx).await.outcome, Outcome::Stored);
    assert_eq!(step(&mut fx).await.outcome, Outcome::Stored);

    let stored = fx.store.get_order(&original.order_uid).await.unwrap();
    assert_eq!(stored, revised);
    assert_eq!(fx.store.len(), 1);
}

#[tokio::test]
async fn test_redelivered_duplicate_is_idempotent() {
    let mut fx = fixture();
    fx.broker.publish(valid_order_json("ord-dup"));
    fx.broker.publish(valid_order_json("ord-dup"));

    step(&mut fx).await;
    step(&mut fx).await;

    assert_eq!(fx.store.len(), 1);
    assert_eq!(
        fx.store.get_order(&OrderUid::new("ord-dup")).await.unwrap(),
        valid_order("ord-dup")
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_processes_stream_and_shuts_down() {
    let Fixture {
        broker,
        store,
        dlq,
        mut pipeline,
    } = fixture();
    broker.publish(valid_order_json("ord-a"));
    broker.publish(b"[]".to_vec());
    broker.publish(valid_order_json("ord-b"));
    store.set_available(false);

    let (tx, rx) = watch::channel(false);
    let control = {
        let store = Arc::clone(&store);
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            store.set_available(true);
            tokio::time::sleep(Duration::from_secs(3)).await;
            broker.publish(valid_order_json("ord-c"));
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(true).unwrap();
        })
    };

    let stats = pipeline.run(rx).await;
    control.await.unwrap();

    assert_eq!(stats.stored, 3);
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.redelivered, 2);
    assert_eq!(broker.committed(), 4);
    assert_eq!(store.len(), 3);
    assert_eq!(dlq.records().len(), 1);
}
