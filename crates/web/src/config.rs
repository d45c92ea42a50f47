//! Web configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `WEB_HOST` - Bind address (default: 127.0.0.1)
//! - `WEB_PORT` - Listen port (default: 4000)
//! - `CACHE_SIZE` - Maximum cached orders, 0 for unbounded (default: 1000)
//! - `CACHE_TTL` - Lifetime of a cached order, 0 to disable expiry (default: 30s)
//! - `HTTP_REQUEST_TIMEOUT` - Whole-request timeout (default: 10s)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `LOG_LEVEL` - Default filter when `RUST_LOG` is unset (default: info)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! Durations accept `ms`, `s`, `m` and `h` suffixes; a bare number is seconds.

use core::str::FromStr;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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

/// Read-through cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum entries; 0 means unbounded.
    pub capacity: usize,
    /// Entry lifetime; zero disables expiry.
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl: Duration::from_secs(30),
        }
    }
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub db_max_connections: u32,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub cache: CacheSettings,
    /// Upper bound on the database lookup behind a cache miss
    pub lookup_timeout: Duration,
    /// Upper bound on a whole request
    pub request_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl WebConfig {
    /// Database lookup bound applied by the order handler.
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

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
        let defaults = CacheSettings::default();

        Ok(Self {
            database_url: env.database_url("WEB_DATABASE_URL")?,
            db_max_connections: env.parsed("DB_MAX_CONNECTIONS", 10)?,
            host: env.parsed("WEB_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parsed("WEB_PORT", 4000)?,
            cache: CacheSettings {
                capacity: env.parsed("CACHE_SIZE", defaults.capacity)?,
                ttl: env.duration("CACHE_TTL", defaults.ttl)?,
            },
            lookup_timeout: Self::LOOKUP_TIMEOUT,
            request_timeout: env.duration("HTTP_REQUEST_TIMEOUT", Duration::from_secs(10))?,
            log_level: env.or_default("LOG_LEVEL", "info"),
            log_format: env.parsed("LOG_FORMAT", LogFormat::Text)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Parse a duration such as `250ms`, `30s`, `5m`, `1h` or `45` (seconds).
///
/// # Errors
///
/// Returns a description of the problem when the value cannot be parsed.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("`{value}` does not start with a whole number"))?;

    let seconds_per_unit = match unit.trim() {
        "ms" => return Ok(Duration::from_millis(amount)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => return Err(format!("unknown duration unit `{other}`")),
    };

    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("`{value}` is too large"))
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

    fn duration(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.optional(key).map_or(Ok(default), |value| {
            parse_duration(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
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
