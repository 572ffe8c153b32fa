//! Stripe API client for hosted checkout sessions.
//!
//! The broker turns a priced cart into a one-time-payment Checkout Session:
//! one line item per cart entry, the order id (and campaign/fundraiser
//! context) embedded as session metadata, and redirect targets derived from
//! the caller's origin. Products provisioned with a provider price use it by
//! reference; the rest get an ad-hoc price built from the catalog name and
//! unit price.
//!
//! Request bodies are form-encoded per the Stripe API convention; building
//! them is a pure function so the mapping is testable without the network.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use pledgekit_core::{CampaignId, FundraiserRef, OrderId};

use crate::catalog::PricedItem;
use crate::config::StripeConfig;

/// Stripe API version pinned by this client.
const API_VERSION: &str = "2024-06-20";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or build a request.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A monetary amount could not be expressed in integer minor units.
    #[error("amount not representable in minor units: {0}")]
    AmountNotRepresentable(Decimal),
}

/// A hosted checkout session, as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Provider session identifier, linked back onto the order.
    pub id: String,
    /// Hosted payment page the caller is redirected to.
    pub url: String,
}

/// Inputs for a session creation request.
#[derive(Debug)]
pub struct SessionParams<'a> {
    pub order_id: OrderId,
    pub campaign_id: CampaignId,
    pub fundraiser_id: Option<&'a FundraiserRef>,
    pub items: &'a [PricedItem],
    pub success_url: String,
    pub cancel_url: String,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    currency: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert("Authorization", auth_value);

        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            currency: config.currency.clone(),
        })
    }

    /// Create a one-time-payment hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built, the API call fails,
    /// or the response cannot be parsed.
    pub async fn create_checkout_session(
        &self,
        params: &SessionParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let form = build_session_form(params, &self.currency)?;
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

/// Build the form-encoded body for a session creation request.
fn build_session_form(
    params: &SessionParams<'_>,
    currency: &str,
) -> Result<Vec<(String, String)>, StripeError> {
    let mut form = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), params.success_url.clone()),
        ("cancel_url".to_owned(), params.cancel_url.clone()),
        (
            "metadata[order_id]".to_owned(),
            params.order_id.to_string(),
        ),
        (
            "metadata[campaign_id]".to_owned(),
            params.campaign_id.to_string(),
        ),
    ];

    if let Some(fundraiser) = params.fundraiser_id {
        form.push((
            "metadata[fundraiser_id]".to_owned(),
            fundraiser.to_string(),
        ));
    }

    for (i, item) in params.items.iter().enumerate() {
        form.push((
            format!("line_items[{i}][quantity]"),
            item.quantity.to_string(),
        ));

        match &item.payment_reference_id {
            Some(price_ref) => {
                form.push((format!("line_items[{i}][price]"), price_ref.clone()));
            }
            None => {
                form.push((
                    format!("line_items[{i}][price_data][currency]"),
                    currency.to_owned(),
                ));
                form.push((
                    format!("line_items[{i}][price_data][product_data][name]"),
                    item.product_name.clone(),
                ));
                form.push((
                    format!("line_items[{i}][price_data][unit_amount]"),
                    to_minor_units(item.unit_price)?.to_string(),
                ));
            }
        }
    }

    Ok(form)
}

/// Convert a decimal major-unit amount to integer minor units (cents).
fn to_minor_units(amount: Decimal) -> Result<i64, StripeError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or(StripeError::AmountNotRepresentable(amount))
}

/// Pull the human-readable message out of a Stripe error body, falling back
/// to the raw text.
fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use pledgekit_core::ProductRef;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(
        product: &str,
        name: &str,
        price: &str,
        quantity: i64,
        payment_ref: Option<&str>,
    ) -> PricedItem {
        PricedItem {
            product: ProductRef::parse(product).unwrap(),
            product_name: name.to_owned(),
            payment_reference_id: payment_ref.map(str::to_owned),
            quantity,
            unit_price: dec(price),
            unit_cost: dec("0.00"),
            subtotal: dec(price) * Decimal::from(quantity),
        }
    }

    fn lookup<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form_with_provider_price_reference() {
        let order_id = OrderId::generate();
        let campaign_id = CampaignId::generate();
        let items = vec![item("p1", "Team Shirt", "25.00", 2, Some("price_abc"))];
        let fundraiser = FundraiserRef::parse("f_42").unwrap();
        let params = SessionParams {
            order_id,
            campaign_id,
            fundraiser_id: Some(&fundraiser),
            items: &items,
            success_url: "https://example.org/checkout/success".to_owned(),
            cancel_url: "https://example.org/checkout/cancelled".to_owned(),
        };

        let form = build_session_form(&params, "usd").unwrap();

        assert_eq!(lookup(&form, "mode"), Some("payment"));
        assert_eq!(
            lookup(&form, "metadata[order_id]"),
            Some(order_id.to_string().as_str())
        );
        assert_eq!(
            lookup(&form, "metadata[campaign_id]"),
            Some(campaign_id.to_string().as_str())
        );
        assert_eq!(lookup(&form, "metadata[fundraiser_id]"), Some("f_42"));
        assert_eq!(lookup(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(lookup(&form, "line_items[0][price]"), Some("price_abc"));
        // Referenced prices never carry ad-hoc price data.
        assert_eq!(lookup(&form, "line_items[0][price_data][currency]"), None);
    }

    #[test]
    fn test_session_form_with_ad_hoc_price_data() {
        let items = vec![item("p2", "Sticker Pack", "4.50", 3, None)];
        let params = SessionParams {
            order_id: OrderId::generate(),
            campaign_id: CampaignId::generate(),
            fundraiser_id: None,
            items: &items,
            success_url: "https://example.org/s".to_owned(),
            cancel_url: "https://example.org/c".to_owned(),
        };

        let form = build_session_form(&params, "usd").unwrap();

        assert_eq!(lookup(&form, "line_items[0][price]"), None);
        assert_eq!(
            lookup(&form, "line_items[0][price_data][currency]"),
            Some("usd")
        );
        assert_eq!(
            lookup(&form, "line_items[0][price_data][product_data][name]"),
            Some("Sticker Pack")
        );
        assert_eq!(
            lookup(&form, "line_items[0][price_data][unit_amount]"),
            Some("450")
        );
        assert_eq!(lookup(&form, "metadata[fundraiser_id]"), None);
    }

    #[test]
    fn test_line_items_indexed_per_entry() {
        let items = vec![
            item("p1", "A", "1.00", 1, Some("price_a")),
            item("p2", "B", "2.00", 2, None),
        ];
        let params = SessionParams {
            order_id: OrderId::generate(),
            campaign_id: CampaignId::generate(),
            fundraiser_id: None,
            items: &items,
            success_url: "https://example.org/s".to_owned(),
            cancel_url: "https://example.org/c".to_owned(),
        };

        let form = build_session_form(&params, "usd").unwrap();

        assert_eq!(lookup(&form, "line_items[0][price]"), Some("price_a"));
        assert_eq!(lookup(&form, "line_items[1][quantity]"), Some("2"));
        assert_eq!(
            lookup(&form, "line_items[1][price_data][unit_amount]"),
            Some("200")
        );
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec("25.00")).unwrap(), 2500);
        assert_eq!(to_minor_units(dec("4.50")).unwrap(), 450);
        assert_eq!(to_minor_units(dec("0.01")).unwrap(), 1);
        assert_eq!(to_minor_units(dec("0.005")).unwrap(), 0);
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error": {"message": "No such price: price_x", "type": "invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "No such price: price_x");

        assert_eq!(extract_error_message("not json"), "not json");
    }
}
