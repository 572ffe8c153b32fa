//! PledgeKit CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run checkout database migrations
//! pledgekit-cli migrate
//!
//! # Seed the catalog with demo products
//! pledgekit-cli seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the catalog with demo products

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pledgekit-cli")]
#[command(author, version, about = "PledgeKit CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checkout database migrations
    Migrate,
    /// Seed the catalog with demo products
    Seed {
        /// Remove existing demo products first
        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::checkout().await?,
        Commands::Seed { replace } => commands::seed::catalog(replace).await?,
    }
    Ok(())
}
