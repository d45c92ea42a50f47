//! Offline payload validation.
//!
//! Runs the consumer's decode and validation steps against a file, so an
//! operator can see why a dead-lettered payload was rejected.

use std::io::Read;
use std::path::Path;

use orderflow_core::{DecodeError, Order, ValidationErrors, decode_order, validate_order};
use thiserror::Error;

/// Errors that can occur while validating a payload.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The payload could not be read.
    #[error("Failed to read payload: {0}")]
    Io(#[from] std::io::Error),

    /// The payload is not a well-formed order document.
    #[error("Payload does not decode: {0}")]
    Decode(#[from] DecodeError),

    /// The order breaks one or more rules.
    #[error("Order is invalid ({} violations)", .0.len())]
    Invalid(ValidationErrors),
}

/// Validate the payload at `path` (`-` reads stdin) and report the result.
///
/// # Errors
///
/// Returns an error if the payload cannot be read, decoded or validated.
#[allow(clippy::print_stdout)]
pub fn run(path: &Path) -> Result<(), ValidateError> {
    let bytes = read_payload(path)?;

    match check(&bytes) {
        Ok(order) => {
            println!(
                "ok: order {} ({} items)",
                order.order_uid,
                order.items.len()
            );
            Ok(())
        }
        Err(ValidateError::Invalid(errors)) => {
            for field in &errors {
                println!("{field}");
            }
            Err(ValidateError::Invalid(errors))
        }
        Err(e) => Err(e),
    }
}

/// Decode and validate a payload.
///
/// # Errors
///
/// Returns [`ValidateError::Decode`] or [`ValidateError::Invalid`].
pub fn check(bytes: &[u8]) -> Result<Order, ValidateError> {
    let order = decode_order(bytes)?;
    validate_order(&order).map_err(ValidateError::Invalid)?;
    Ok(order)
}

fn read_payload(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read(path)
    }
}
