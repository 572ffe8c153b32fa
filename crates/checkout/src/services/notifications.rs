//! Order-placed notification webhook.
//!
//! The email/notification function is an external collaborator; this client
//! is its invocation interface. Called fire-and-forget from a spawned task
//! after a successful checkout - delivery failures are logged and never
//! surface to the payer.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use pledgekit_core::{CampaignId, OrderId};

/// Errors that can occur when delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook returned a non-success status.
    #[error("webhook error: {status}")]
    Webhook { status: u16 },
}

/// Order-placed event payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedEvent {
    pub event: &'static str,
    pub order_id: OrderId,
    pub campaign_id: CampaignId,
    pub fundraiser_id: Option<String>,
    pub total_amount: Decimal,
    pub customer_email: String,
}

impl OrderPlacedEvent {
    /// Event type marker for the webhook consumer.
    pub const EVENT: &'static str = "order.placed";
}

/// Webhook client for order notifications.
#[derive(Debug, Clone)]
pub struct NotificationClient {
    client: reqwest::Client,
    webhook_url: String,
}

impl NotificationClient {
    /// Create a new notification client targeting `webhook_url`.
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Deliver an order-placed event.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the webhook answers with a
    /// non-success status.
    pub async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Webhook {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn test_event_serializes_camel_case() {
        let event = OrderPlacedEvent {
            event: OrderPlacedEvent::EVENT,
            order_id: OrderId::generate(),
            campaign_id: CampaignId::generate(),
            fundraiser_id: Some("f_1".to_owned()),
            total_amount: Decimal::from_str("50.00").unwrap(),
            customer_email: "a@b.com".to_owned(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "order.placed");
        assert_eq!(json["fundraiserId"], "f_1");
        assert_eq!(json["customerEmail"], "a@b.com");
        // rust_decimal's serde-with-str feature serializes amounts as strings
        assert_eq!(json["totalAmount"], "50.00");
    }
}
