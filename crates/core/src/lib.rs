//! Orderflow Core - Order domain types and validation.
//!
//! This crate provides the types shared by every Orderflow component:
//! - `consumer` - Ingests orders from the message stream into `PostgreSQL`
//! - `web` - Serves stored orders through a cached lookup API
//! - `cli` - Operator tools for payload validation and lookups
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no broker clients. Decoding and validation are deterministic given
//! their input (and an explicit clock for [`validation::validate_order_at`]).
//!
//! # Modules
//!
//! - [`types`] - The `Order` aggregate, id newtypes and `Email`
//! - [`validation`] - Strict payload decoding and invariant checks

#![cfg_attr(not(test), forbid(unsafe_code))]

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{
    DecodeError, ErrorKind, FieldError, ValidationErrors, decode_order, validate_order,
    validate_order_at,
};
