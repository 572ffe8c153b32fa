//! Catalog seeding for local development.
//!
//! Inserts a small demo catalog so a freshly-migrated database can take a
//! checkout end to end. Demo product references are prefixed `demo_` so a
//! re-seed with `--replace` only touches its own rows.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use pledgekit_core::{ProductRef, ReferenceError};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// A demo product definition is malformed.
    #[error("invalid demo product {0}: {1}")]
    InvalidProduct(&'static str, ReferenceError),

    /// A demo price or cost is malformed.
    #[error("invalid demo amount for {0}")]
    InvalidAmount(&'static str),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Demo products: (reference, name, price, cost, active).
const DEMO_PRODUCTS: &[(&str, &str, &str, &str, bool)] = &[
    ("demo_tshirt", "Campaign T-Shirt", "25.00", "10.00", true),
    ("demo_mug", "Campaign Mug", "12.00", "4.50", true),
    ("demo_stickers", "Sticker Pack", "4.50", "1.00", true),
    ("demo_poster", "Signed Poster", "40.00", "15.00", true),
    // Inactive on purpose: exercises the catalog gate locally.
    ("demo_retired", "Retired Item", "99.00", "50.00", false),
];

/// Seed the catalog with demo products.
///
/// # Errors
///
/// Returns an error if `CHECKOUT_DATABASE_URL` is missing or a database
/// operation fails.
pub async fn catalog(replace: bool) -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CHECKOUT_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| SeedError::MissingEnvVar("CHECKOUT_DATABASE_URL"))?;

    let pool = PgPool::connect(database_url.expose_secret()).await?;

    if replace {
        let deleted = sqlx::query("DELETE FROM products WHERE id LIKE 'demo_%'")
            .execute(&pool)
            .await?
            .rows_affected();
        info!("Removed {deleted} existing demo products");
    }

    let mut inserted = 0_u64;
    for &(id, name, price, cost, is_active) in DEMO_PRODUCTS {
        let reference =
            ProductRef::parse(id).map_err(|e| SeedError::InvalidProduct(id, e))?;
        let price: Decimal = price.parse().map_err(|_| SeedError::InvalidAmount(id))?;
        let cost: Decimal = cost.parse().map_err(|_| SeedError::InvalidAmount(id))?;

        let result = sqlx::query(
            r"
            INSERT INTO products (id, name, price, cost, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&reference)
        .bind(name)
        .bind(price)
        .bind(cost)
        .bind(is_active)
        .execute(&pool)
        .await?;

        inserted += result.rows_affected();
    }

    info!("Seeded {inserted} demo products");
    Ok(())
}
