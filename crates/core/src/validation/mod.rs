//! Strict decoding and semantic validation of order payloads.
//!
//! The two steps are deliberately separate:
//!
//! 1. [`decode_order`] turns raw bytes into an [`Order`](crate::Order) and fails
//!    on malformed JSON or on any field the schema does not know.
//! 2. [`validate_order`] checks the decoded order against the business
//!    invariants and reports *every* violation at once.
//!
//! Neither step performs I/O or logs; callers decide how to route failures.

mod decode;
mod errors;
mod rules;

pub use decode::{DecodeError, DecodeErrorCategory, decode_order};
pub use errors::{ErrorKind, FieldError, ValidationErrors};
pub use rules::{
    ALLOWED_CURRENCIES, FUTURE_SKEW_TOLERANCE, MAX_PAYMENT_DT, validate_order, validate_order_at,
};
