//! Subcommand implementations.

pub mod show;
pub mod validate;
