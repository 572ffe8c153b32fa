//! Database operations for the checkout `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `products` - Catalog mirror (system of record for price/cost)
//! - `orders` - Orders and their pipeline status
//! - `order_items` - Frozen line items per order
//! - `donors` - Per-campaign donor records, unique on (campaign, email)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/checkout/migrations/` and run via:
//! ```bash
//! cargo run -p pledgekit-cli -- migrate
//! ```
//!
//! # Transactions
//!
//! Deliberately, none span the pipeline: the order, its items, and the donor
//! record are independent immediately-committed writes. The order status
//! records exactly how far a request got (see
//! [`pledgekit_core::OrderStatus`]); a reconciliation sweep owns anything
//! left in an early state.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod donors;
pub mod orders;
pub mod products;

pub use donors::DonorRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate idempotency key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
