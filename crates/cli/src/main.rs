//! Orderflow CLI - operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Check a payload the way the consumer would
//! of-cli validate order.json
//!
//! # Read a payload from stdin
//! cat order.json | of-cli validate -
//!
//! # Print a stored order
//! of-cli show b563feb7b2b84b6test
//! ```
//!
//! # Commands
//!
//! - `validate` - Decode and validate an order payload, listing every violation
//! - `show` - Load an order from `PostgreSQL` and print it as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "of-cli")]
#[command(author, version, about = "Orderflow operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and validate an order payload
    Validate {
        /// Path to a JSON payload, or `-` for stdin
        file: PathBuf,
    },
    /// Print a stored order as JSON
    Show {
        /// Order id
        order_uid: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Validate { file } => commands::validate::run(&file)?,
        Commands::Show { order_uid } => commands::show::run(&order_uid).await?,
    }
    Ok(())
}
