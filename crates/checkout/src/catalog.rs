//! Price authority: server-side recomputation of all monetary values.
//!
//! This is the trust boundary of the pipeline. The catalog is the only
//! source of unit price and cost; the only client-controlled input admitted
//! into the monetary calculation is the quantity. A manipulated request
//! cannot under- or over-pay by forging price fields - those fields do not
//! exist past deserialization.
//!
//! The arithmetic is pure and separated from the catalog fetch
//! ([`crate::db::products`]) so it can be tested without a database.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use pledgekit_core::ProductRef;

use crate::validate::ValidatedCartEntry;

/// A catalog product: the system of record for monetary unit values.
/// Read-only to this pipeline.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductRef,
    pub name: String,
    pub price: Decimal,
    pub cost: Decimal,
    /// Payment-provider price reference, when one has been provisioned.
    pub payment_reference_id: Option<String>,
    pub is_active: bool,
}

/// Catalog lookup failures. These occur before any persistence, so they
/// leave zero side effects.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The cart references a product the catalog does not know.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductRef),
    /// The cart references a product that is no longer purchasable.
    #[error("inactive product: {0}")]
    InactiveProduct(ProductRef),
}

/// A cart entry with authoritative unit values frozen in.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub product: ProductRef,
    pub product_name: String,
    pub payment_reference_id: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
}

/// A fully priced cart with recomputed totals.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub items: Vec<PricedItem>,
    /// `sum(item.subtotal)`
    pub total_amount: Decimal,
    /// `sum((unit_price - unit_cost) * quantity)`
    pub profit_amount: Decimal,
}

/// Price a validated cart against the fetched catalog products.
///
/// # Errors
///
/// Fails on the first cart entry whose product is missing from `products`
/// or inactive; no partial pricing is returned.
pub fn price_cart(
    products: &HashMap<ProductRef, Product>,
    entries: &[ValidatedCartEntry],
) -> Result<PricedCart, CatalogError> {
    let mut items = Vec::with_capacity(entries.len());
    let mut total_amount = Decimal::ZERO;
    let mut profit_amount = Decimal::ZERO;

    for entry in entries {
        let product = products
            .get(&entry.product)
            .ok_or_else(|| CatalogError::UnknownProduct(entry.product.clone()))?;

        if !product.is_active {
            return Err(CatalogError::InactiveProduct(entry.product.clone()));
        }

        let quantity = Decimal::from(entry.quantity);
        let subtotal = product.price * quantity;

        total_amount += subtotal;
        profit_amount += (product.price - product.cost) * quantity;

        items.push(PricedItem {
            product: entry.product.clone(),
            product_name: product.name.clone(),
            payment_reference_id: product.payment_reference_id.clone(),
            quantity: entry.quantity,
            unit_price: product.price,
            unit_cost: product.cost,
            subtotal,
        });
    }

    Ok(PricedCart {
        items,
        total_amount,
        profit_amount,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn product(id: &str, price: &str, cost: &str, active: bool) -> Product {
        Product {
            id: ProductRef::parse(id).unwrap(),
            name: format!("Product {id}"),
            price: dec(price),
            cost: dec(cost),
            payment_reference_id: None,
            is_active: active,
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductRef, Product> {
        products.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    fn entry(id: &str, quantity: i64) -> ValidatedCartEntry {
        ValidatedCartEntry {
            product: ProductRef::parse(id).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_totals_recomputed_from_catalog() {
        // price=25.00, cost=10.00, quantity=2:
        // subtotal 50.00, total 50.00, profit 30.00
        let products = catalog(vec![product("p1", "25.00", "10.00", true)]);
        let priced = price_cart(&products, &[entry("p1", 2)]).unwrap();

        assert_eq!(priced.items.len(), 1);
        assert_eq!(priced.items[0].subtotal, dec("50.00"));
        assert_eq!(priced.items[0].unit_price, dec("25.00"));
        assert_eq!(priced.items[0].unit_cost, dec("10.00"));
        assert_eq!(priced.total_amount, dec("50.00"));
        assert_eq!(priced.profit_amount, dec("30.00"));
    }

    #[test]
    fn test_multiple_entries_summed() {
        let products = catalog(vec![
            product("p1", "25.00", "10.00", true),
            product("p2", "5.50", "2.00", true),
        ]);
        let priced = price_cart(&products, &[entry("p1", 2), entry("p2", 4)]).unwrap();

        // 50.00 + 22.00
        assert_eq!(priced.total_amount, dec("72.00"));
        // 30.00 + 14.00
        assert_eq!(priced.profit_amount, dec("44.00"));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let products = catalog(vec![product("p1", "25.00", "10.00", true)]);
        let err = price_cart(&products, &[entry("p1", 1), entry("ghost", 1)]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownProduct(p) if p.as_str() == "ghost"));
    }

    #[test]
    fn test_inactive_product_rejected() {
        let products = catalog(vec![product("retired", "25.00", "10.00", false)]);
        let err = price_cart(&products, &[entry("retired", 1)]).unwrap_err();
        assert!(matches!(err, CatalogError::InactiveProduct(p) if p.as_str() == "retired"));
    }

    #[test]
    fn test_large_quantity_exact() {
        let products = catalog(vec![product("p1", "0.10", "0.03", true)]);
        let priced = price_cart(&products, &[entry("p1", 100_000)]).unwrap();

        assert_eq!(priced.total_amount, dec("10000.00"));
        assert_eq!(priced.profit_amount, dec("7000.00"));
    }

    #[test]
    fn test_duplicate_product_entries_priced_independently() {
        let products = catalog(vec![product("p1", "3.00", "1.00", true)]);
        let priced = price_cart(&products, &[entry("p1", 1), entry("p1", 2)]).unwrap();

        assert_eq!(priced.items.len(), 2);
        assert_eq!(priced.total_amount, dec("9.00"));
    }

    #[test]
    fn test_empty_entries_zero_totals() {
        // The validator rejects empty carts upstream; the arithmetic itself
        // degrades to zero rather than panicking.
        let priced = price_cart(&HashMap::new(), &[]).unwrap();
        assert_eq!(priced.total_amount, Decimal::ZERO);
        assert_eq!(priced.profit_amount, Decimal::ZERO);
    }
}
