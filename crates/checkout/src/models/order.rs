//! Order and line-item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pledgekit_core::{CampaignId, Email, FundraiserRef, OrderId, OrderItemId, OrderStatus, ProductRef};

/// A persisted order.
///
/// Invariants (established by the price authority, frozen at insert):
/// - `total_amount` equals the sum of its items' subtotals
/// - `profit_amount` equals the sum of `(unit_price - unit_cost) * quantity`
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub campaign_id: CampaignId,
    pub fundraiser_id: Option<FundraiserRef>,
    pub customer_email: Email,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub profit_amount: Decimal,
    pub status: OrderStatus,
    pub payment_session_id: Option<String>,
    pub payment_session_url: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted order line item. Unit price and cost are copied from the
/// catalog at pricing time and never change for the life of the order.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductRef,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
}
