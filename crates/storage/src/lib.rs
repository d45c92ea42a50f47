//! Orderflow Storage - durable, idempotent order persistence.
//!
//! # Tables
//!
//! - `orders` - Order header, keyed by `order_uid`
//! - `deliveries` - One row per order, keyed by `order_uid`
//! - `payments` - One row per order, keyed by the globally unique `transaction`
//! - `items` - Line items, fully replaced on every save
//!
//! The reference DDL lives in `crates/storage/schema.sql`. Schema changes are
//! applied out of band; nothing in this crate creates or alters tables.
//!
//! # Implementations
//!
//! - [`PgOrderStore`] - `PostgreSQL` via `sqlx`, one transaction per save
//! - [`MemoryOrderStore`] - In-process map with the same replace semantics,
//!   used by tests and local tooling

#![cfg_attr(not(test), forbid(unsafe_code))]

mod error;
pub mod memory;
mod pool;
pub mod postgres;
mod rows;
mod store;

pub use error::RepositoryError;
pub use memory::MemoryOrderStore;
pub use pool::{PoolSettings, create_pool};
pub use postgres::PgOrderStore;
pub use store::OrderStore;
