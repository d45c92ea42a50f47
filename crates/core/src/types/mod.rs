//! Core types for Orderflow.
//!
//! This module provides the order aggregate and type-safe wrappers for the
//! identifiers and addresses it carries.

pub mod email;
pub mod id;
pub mod order;

pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Delivery, Item, Order, Payment};
