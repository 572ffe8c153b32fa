//! Order ledger: order and line-item persistence.
//!
//! The ledger is the first stage with side effects. Writes are separate,
//! immediately-committed statements with no enclosing transaction; the order
//! status records how far a request got so a failed request leaves a
//! locatable orphan rather than a half-committed transaction:
//!
//! 1. insert the order (`awaiting_items`)
//! 2. insert one item row per cart entry
//! 3. advance to `awaiting_payment_session`
//! 4. attach the provider session (`awaiting_completion`)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use pledgekit_core::{CampaignId, Email, FundraiserRef, OrderId, OrderItemId, OrderStatus};

use super::RepositoryError;
use crate::catalog::PricedItem;
use crate::models::{Order, OrderItem};

/// Inputs for a new order row. Totals come from the price authority, never
/// from the request.
#[derive(Debug)]
pub struct NewOrder {
    pub campaign_id: CampaignId,
    pub fundraiser_id: Option<FundraiserRef>,
    pub customer_email: Email,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub profit_amount: Decimal,
    pub idempotency_key: Option<String>,
}

/// Row shape for order reads.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    campaign_id: Uuid,
    fundraiser_id: Option<String>,
    customer_email: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    total_amount: Decimal,
    profit_amount: Decimal,
    status: String,
    payment_session_id: Option<String>,
    payment_session_url: Option<String>,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let fundraiser_id = row
            .fundraiser_id
            .as_deref()
            .map(FundraiserRef::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid fundraiser id in database: {e}"))
            })?;

        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            campaign_id: CampaignId::new(row.campaign_id),
            fundraiser_id,
            customer_email,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            total_amount: row.total_amount,
            profit_amount: row.profit_amount,
            status,
            payment_session_id: row.payment_session_id,
            payment_session_url: row.payment_session_url,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order in `awaiting_items`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the idempotency key is already
    /// taken (a concurrent duplicate submission won the insert race).
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_order(&self, new: NewOrder) -> Result<Order, RepositoryError> {
        let id = OrderId::generate();
        let status = OrderStatus::AwaitingItems;
        let created_at = Utc::now();

        sqlx::query(
            r"
            INSERT INTO orders (
                id, campaign_id, fundraiser_id,
                customer_email, customer_name, customer_phone,
                total_amount, profit_amount, status,
                idempotency_key, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(id)
        .bind(new.campaign_id)
        .bind(&new.fundraiser_id)
        .bind(&new.customer_email)
        .bind(&new.customer_name)
        .bind(&new.customer_phone)
        .bind(new.total_amount)
        .bind(new.profit_amount)
        .bind(status.as_str())
        .bind(&new.idempotency_key)
        .bind(created_at)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("idempotency key already used".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(Order {
            id,
            campaign_id: new.campaign_id,
            fundraiser_id: new.fundraiser_id,
            customer_email: new.customer_email,
            customer_name: new.customer_name,
            customer_phone: new.customer_phone,
            total_amount: new.total_amount,
            profit_amount: new.profit_amount,
            status,
            payment_session_id: None,
            payment_session_url: None,
            idempotency_key: new.idempotency_key,
            created_at,
        })
    }

    /// Insert one item row per priced cart entry, then advance the order to
    /// `awaiting_payment_session`.
    ///
    /// Each insert commits independently. A failure part-way leaves the
    /// order in `awaiting_items` with a partial item set; the caller logs
    /// the order id and the sweep repairs it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert or the status
    /// advance fails.
    pub async fn insert_items(
        &self,
        order_id: OrderId,
        items: &[PricedItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut inserted = Vec::with_capacity(items.len());

        for item in items {
            let row = OrderItem {
                id: OrderItemId::generate(),
                order_id,
                product_id: item.product.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                unit_cost: item.unit_cost,
                subtotal: item.subtotal,
            };

            sqlx::query(
                r"
                INSERT INTO order_items (
                    id, order_id, product_id,
                    quantity, unit_price, unit_cost, subtotal
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(row.id)
            .bind(row.order_id)
            .bind(&row.product_id)
            .bind(row.quantity)
            .bind(row.unit_price)
            .bind(row.unit_cost)
            .bind(row.subtotal)
            .execute(self.pool)
            .await?;

            inserted.push(row);
        }

        self.set_status(order_id, OrderStatus::AwaitingPaymentSession)
            .await?;

        Ok(inserted)
    }

    /// Attach the provider session to the order and advance it to
    /// `awaiting_completion`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order no longer exists,
    /// or `RepositoryError::Database` if the update fails.
    pub async fn attach_payment_session(
        &self,
        order_id: OrderId,
        session_id: &str,
        session_url: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET payment_session_id = $2,
                payment_session_url = $3,
                status = $4
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(session_id)
        .bind(session_url)
        .bind(OrderStatus::AwaitingCompletion.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Look up an order by its idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"
            SELECT id, campaign_id, fundraiser_id,
                   customer_email, customer_name, customer_phone,
                   total_amount, profit_amount, status,
                   payment_session_id, payment_session_url,
                   idempotency_key, created_at
            FROM orders
            WHERE idempotency_key = $1
            ",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
