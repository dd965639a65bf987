//! memoledger CLI
//!
//! Command-line reconciliation over ledger exports. An export is a JSON
//! array of transactions as stored under `customers/{customer}/transactions`.
//!
//! # Commands
//!
//! - `ledger` - Show memo groups with paid and due amounts
//! - `statement` - Show a customer's running balance
//! - `dues` - Show outstanding balances per customer

mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// memoledger command-line tools.
#[derive(Parser)]
#[command(name = "memoledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show memo groups with paid and due amounts
    Ledger {
        /// Path to the JSON export
        #[arg(short, long)]
        file: PathBuf,

        /// Only show this customer
        #[arg(short, long)]
        customer: Option<String>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Include payments whose memo has no sale
        #[arg(short, long)]
        all: bool,
    },

    /// Show a customer's running balance
    Statement {
        /// Path to the JSON export
        #[arg(short, long)]
        file: PathBuf,

        /// Customer to report on
        #[arg(short, long)]
        customer: String,

        /// First business date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last business date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show outstanding balances per customer
    Dues {
        /// Path to the JSON export
        #[arg(short, long)]
        file: PathBuf,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ledger {
            file,
            customer,
            format,
            all,
        } => {
            commands::ledger::run(&file, customer.as_deref(), &format, all)?;
        }
        Commands::Statement {
            file,
            customer,
            from,
            to,
            format,
        } => {
            commands::statement::run(&file, &customer, from, to, &format)?;
        }
        Commands::Dues { file, format } => {
            commands::dues::run(&file, &format)?;
        }
        Commands::Version => {
            println!("memoledger CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
