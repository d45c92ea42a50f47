//! Consumer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KAFKA_BROKERS` - Comma-separated bootstrap servers
//! - `CONSUMER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `KAFKA_TOPIC` - Source topic (default: orders)
//! - `KAFKA_GROUP_ID` - Consumer group (default: orders-consumer)
//! - `KAFKA_DLQ_TOPIC` - Dead-letter topic; unset disables dead-lettering
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `LOG_LEVEL` - Default filter when `RUST_LOG` is unset (default: info)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use core::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    /// Dead-letter topic; `None` disables dead-lettering.
    pub dlq_topic: Option<String>,
}

/// Consumer application configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub db_max_connections: u32,
    pub kafka: KafkaSettings,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl ConsumerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let brokers = split_list(&env.required("KAFKA_BROKERS")?);
        if brokers.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "KAFKA_BROKERS".to_string(),
                "no broker addresses given".to_string(),
            ));
        }

        let kafka = KafkaSettings {
            brokers,
            topic: env.or_default("KAFKA_TOPIC", "orders"),
            group_id: env.or_default("KAFKA_GROUP_ID", "orders-consumer"),
            dlq_topic: env.optional("KAFKA_DLQ_TOPIC"),
        };

        Ok(Self {
            database_url: env.database_url("CONSUMER_DATABASE_URL")?,
            db_max_connections: env.parsed("DB_MAX_CONNECTIONS", 5)?,
            kafka,
            log_level: env.or_default("LOG_LEVEL", "info"),
            log_format: env.parsed("LOG_FORMAT", LogFormat::Text)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
