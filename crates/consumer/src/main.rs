//! Orderflow Consumer - order stream to `PostgreSQL`.
//!
//! Reads order documents from Kafka, validates them and upserts them into
//! `PostgreSQL`. Rejected messages go to the dead-letter topic when one is
//! configured.
//!
//! # Shutdown
//!
//! Ctrl+C or SIGTERM stops fetching; a message already in flight is finished
//! (stored and committed, or left uncommitted) before the process exits.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use orderflow_consumer::broker::kafka::KafkaSource;
use orderflow_consumer::dlq::kafka::KafkaRecordPublisher;
use orderflow_consumer::{ConsumerConfig, DeadLetterRouter, LogFormat, Pipeline, PipelineSettings};
use orderflow_storage::{PgOrderStore, PoolSettings, create_pool};
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ConsumerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(config: &ConsumerConfig) {
    // RUST_LOG wins; otherwise LOG_LEVEL applies to our crates
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "orderflow_consumer={level},orderflow_storage={level},rdkafka=warn",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)] // tracing is not initialized yet
async fn main() -> ExitCode {
    let config = match ConsumerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "consumer failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &ConsumerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = create_pool(
        &config.database_url,
        PoolSettings {
            max_connections: config.db_max_connections,
            ..PoolSettings::default()
        },
    )
    .await?;
    tracing::info!("Database pool created");
    let store = PgOrderStore::new(pool);

    let source = KafkaSource::connect(&config.kafka)?;

    let dead_letters = match &config.kafka.dlq_topic {
        Some(topic) => Some(DeadLetterRouter::new(KafkaRecordPublisher::connect(
            &config.kafka.brokers,
            topic.clone(),
        )?)),
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut pipeline = Pipeline::new(
        source,
        store.clone(),
        dead_letters,
        PipelineSettings::default(),
    );
    pipeline.run(shutdown_rx).await;

    store.pool().close().await;
    tracing::info!("consumer stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
