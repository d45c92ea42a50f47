//! Storage error type.

use thiserror::Error;

/// Errors returned by [`OrderStore`](crate::OrderStore) implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or incomplete.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested order was not found.
    #[error("not found")]
    NotFound,

    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Returns `true` for the distinguished "no such order" condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
