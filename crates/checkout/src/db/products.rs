//! Catalog product repository.
//!
//! The catalog is read-only to the checkout pipeline: it is the
//! authoritative source of unit price and cost, and nothing here writes it.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use pledgekit_core::ProductRef;

use super::RepositoryError;
use crate::catalog::Product;

/// Row shape for a catalog fetch.
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price: Decimal,
    cost: Decimal,
    payment_reference_id: Option<String>,
    is_active: bool,
}

/// Repository for catalog reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Bulk-fetch the distinct products referenced by a cart, keyed by
    /// reference. References with no catalog row are simply absent from the
    /// result; the price authority turns absence into a typed failure.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a stored reference is invalid.
    pub async fn fetch_for_cart(
        &self,
        references: &[ProductRef],
    ) -> Result<HashMap<ProductRef, Product>, RepositoryError> {
        let ids: Vec<String> = {
            let mut ids: Vec<String> = references
                .iter()
                .map(|r| r.as_str().to_owned())
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let rows: Vec<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, cost, payment_reference_id, is_active
            FROM products
            WHERE id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut products = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = ProductRef::parse(&row.id).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid product id in database: {e}"))
            })?;

            products.insert(
                id.clone(),
                Product {
                    id,
                    name: row.name,
                    price: row.price,
                    cost: row.cost,
                    payment_reference_id: row.payment_reference_id,
                    is_active: row.is_active,
                },
            );
        }

        Ok(products)
    }
}
