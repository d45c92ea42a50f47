//! The read path over orders written by the ingestion pipeline.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use orderflow_consumer::{DeadLetterRouter, MessageSource, Pipeline, PipelineSettings};
use orderflow_core::Order;
use orderflow_core::fixtures::{valid_order, valid_order_json};
use orderflow_integration_tests::{CollectingPublisher, InMemoryBroker};
use orderflow_storage::{MemoryOrderStore, OrderStore};
use orderflow_web::routes::orders::SOURCE_HEADER;
use orderflow_web::{AppState, CacheSettings};
use tower::ServiceExt;

const TTL: Duration = Duration::from_secs(30);

fn read_api(store: Arc<MemoryOrderStore>, cache: CacheSettings) -> axum::Router {
    let state = AppState::new(store, cache, Duration::from_secs(3));
    orderflow_web::app(state, Duration::from_secs(10))
}

async fn get(app: &axum::Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn source(response: &Response) -> &str {
    response
        .headers()
        .get(SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap()
}

/// Push `payloads` through a pipeline backed by `store`.
async fn ingest(store: &Arc<MemoryOrderStore>, payloads: &[Vec<u8>]) {
    let broker = Arc::new(InMemoryBroker::new());
    let mut pipeline = Pipeline::new(
        Arc::clone(&broker),
        Arc::clone(store),
        Some(DeadLetterRouter::new(CollectingPublisher::new())),
        PipelineSettings::default(),
    );
    for payload in payloads {
        broker.publish(payload.clone());
        let message = broker.fetch().await.unwrap();
        let handled = pipeline.handle(&message).await;
        assert!(handled.outcome.is_final(), "unexpected {:?}", handled.outcome);
    }
}

#[tokio::test]
async fn test_ingested_order_is_served_from_db_then_cache() {
    let store = Arc::new(MemoryOrderStore::new());
    ingest(&store, &[valid_order_json("ord-read")]).await;
    let app = read_api(Arc::clone(&store), CacheSettings::default());

    let first = get(&app, "/order/ord-read").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(source(&first), "db");
    let body = to_bytes(first.into_body(), usize::MAX).await.unwrap();
    let served: Order = serde_json::from_slice(&body).unwrap();
    assert_eq!(served, valid_order("ord-read"));

    let second = get(&app, "/order/ord-read").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(source(&second), "cache");
    assert_eq!(store.read_count(), 1);
}

#[tokio::test]
async fn test_rejected_payload_is_never_served() {
    let store = Arc::new(MemoryOrderStore::new());
    let mut invalid = valid_order("ord-bad");
    invalid.payment.amount += 1;
    ingest(&store, &[serde_json::to_vec(&invalid).unwrap()]).await;
    let app = read_api(store, CacheSettings::default());

    let response = get(&app, "/order/ord-bad").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(source(&response), "miss");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "order not found");
}

#[tokio::test]
async fn test_misses_are_not_cached() {
    let store = Arc::new(MemoryOrderStore::new());
    let app = read_api(Arc::clone(&store), CacheSettings::default());

    assert_eq!(get(&app, "/order/ord-late").await.status(), StatusCode::NOT_FOUND);

    ingest(&store, &[valid_order_json("ord-late")]).await;
    let response = get(&app, "/order/ord-late").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source(&response), "db");
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_reloaded_from_db() {
    let store = Arc::new(MemoryOrderStore::new());
    ingest(&store, &[valid_order_json("ord-ttl")]).await;
    let app = read_api(
        Arc::clone(&store),
        CacheSettings {
            capacity: 10,
            ttl: TTL,
        },
    );

    assert_eq!(source(&get(&app, "/order/ord-ttl").await), "db");
    tokio::time::advance(TTL - Duration::from_secs(1)).await;
    assert_eq!(source(&get(&app, "/order/ord-ttl").await), "cache");

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(source(&get(&app, "/order/ord-ttl").await), "db");
    assert_eq!(store.read_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_order_survives_store_outage_until_expiry() {
    let store = Arc::new(MemoryOrderStore::new());
    store.save_order(&valid_order("ord-outage")).await.unwrap();
    let app = read_api(
        Arc::clone(&store),
        CacheSettings {
            capacity: 10,
            ttl: TTL,
        },
    );
    assert_eq!(source(&get(&app, "/order/ord-outage").await), "db");

    store.set_available(false);
    let cached = get(&app, "/order/ord-outage").await;
    assert_eq!(cached.status(), StatusCode::OK);
    assert_eq!(source(&cached), "cache");

    tokio::time::advance(TTL).await;
    let failed = get(&app, "/order/ord-outage").await;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(source(&failed), "miss");
}

#[tokio::test]
async fn test_small_cache_evicts_least_recently_read() {
    let store = Arc::new(MemoryOrderStore::new());
    ingest(
        &store,
        &[
            valid_order_json("ord-1"),
            valid_order_json("ord-2"),
            valid_order_json("ord-3"),
        ],
    )
    .await;
    let app = read_api(
        Arc::clone(&store),
        CacheSettings {
            capacity: 2,
            ttl: TTL,
        },
    );

    get(&app, "/order/ord-1").await;
    get(&app, "/order/ord-2").await;
    assert_eq!(source(&get(&app, "/order/ord-1").await), "cache");
    get(&app, "/order/ord-3").await;

    assert_eq!(source(&get(&app, "/order/ord-1").await), "cache");
    assert_eq!(source(&get(&app, "/order/ord-2").await), "db");
}

#[tokio::test]
async fn test_serves_over_a_real_socket() {
    let store = Arc::new(MemoryOrderStore::new());
    ingest(&store, &[valid_order_json("ord-socket")]).await;
    let app = read_api(store, CacheSettings::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/order/ord-socket"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()[SOURCE_HEADER], "db");
    let order: Order = response.json().await.unwrap();
    assert_eq!(order.order_uid.as_str(), "ord-socket");

    let health = client.get(format!("http://{addr}/healthz")).send().await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    server.abort();
}

#[tokio::test]
async fn test_duplicate_delivery_does_not_disturb_reads() {
    let store = Arc::new(MemoryOrderStore::new());
    ingest(
        &store,
        &[valid_order_json("ord-twice"), valid_order_json("ord-twice")],
    )
    .await;
    let app = read_api(Arc::clone(&store), CacheSettings::default());

    let response = get(&app, "/order/ord-twice").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.len(), 1);
    assert_eq!(store.save_count(), 2);
}
