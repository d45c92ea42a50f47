//! Print a stored order.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use orderflow_core::OrderUid;
use orderflow_storage::{OrderStore, PgOrderStore, PoolSettings, RepositoryError, create_pool};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur while showing an order.
#[derive(Debug, Error)]
pub enum ShowError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    /// Lookup failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// No order has this id.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The order could not be rendered.
    #[error("Failed to render order: {0}")]
    Render(#[from] serde_json::Error),
}

/// Load `order_uid` and print it as pretty JSON.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the order is missing.
#[allow(clippy::print_stdout)]
pub async fn run(order_uid: &str) -> Result<(), ShowError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| ShowError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(
        &database_url,
        PoolSettings {
            max_connections: 1,
            ..PoolSettings::default()
        },
    )
    .await?;
    let store = PgOrderStore::new(pool);

    let order = match store.get_order(&OrderUid::new(order_uid)).await {
        Ok(order) => order,
        Err(RepositoryError::NotFound) => return Err(ShowError::NotFound(order_uid.to_owned())),
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&order)?);
    store.pool().close().await;
    Ok(())
}
