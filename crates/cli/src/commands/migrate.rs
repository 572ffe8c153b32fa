//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! pledgekit-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string for the
//!   checkout database

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Run the checkout database migrations.
///
/// # Errors
///
/// Returns an error if `CHECKOUT_DATABASE_URL` is missing, the connection
/// fails, or a migration fails.
pub async fn checkout() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CHECKOUT_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("CHECKOUT_DATABASE_URL"))?;

    tracing::info!("Connecting to checkout database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running checkout migrations...");
    sqlx::migrate!("../checkout/migrations").run(&pool).await?;

    tracing::info!("Checkout migrations complete!");
    Ok(())
}
