//! Checkout route handler: the order-intake pipeline.
//!
//! One `POST /api/checkout` runs six stages in order, each short-circuiting
//! with a typed failure:
//!
//! 1. request gate (rate limit, no side effects)
//! 2. schema validation (no side effects)
//! 3. price authority (catalog fetch + server-side totals)
//! 4. order ledger (order row, then item rows - independent writes)
//! 5. payment session broker (provider session, linked back to the order)
//! 6. donor reconciliation (best-effort, never fails the checkout)
//!
//! Stages 1-3 leave zero side effects on failure. From stage 4 on, a failure
//! leaves the order in the status naming how far it got; the log line
//! carries the order id so the reconciliation sweep can find it.

use axum::extract::{Json, State};
use axum::http::{HeaderMap, header};
use serde::Serialize;
use tracing::instrument;
use url::Url;

use pledgekit_core::ProductRef;

use crate::catalog::price_cart;
use crate::config::CheckoutConfig;
use crate::db::{DonorRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::db::donors::DonorUpsert;
use crate::db::orders::NewOrder;
use crate::error::{CheckoutError, Result};
use crate::gate::Decision;
use crate::middleware::ClientIp;
use crate::services::notifications::OrderPlacedEvent;
use crate::state::AppState;
use crate::stripe::SessionParams;
use crate::validate::{CheckoutRequest, validate};

/// Successful checkout response: where to send the payer.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted payment session URL.
    pub url: String,
}

/// Run the checkout pipeline.
#[instrument(name = "checkout", skip_all, fields(client_ip = %client_ip.0))]
pub async fn create(
    State(state): State<AppState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    // Stage 1: request gate.
    if let Decision::Deny { retry_after_secs } = state.limiter().check(client_ip.0) {
        return Err(CheckoutError::RateLimited { retry_after_secs });
    }

    // Stage 2: schema validation.
    let checkout = validate(request)?;

    let orders = OrderRepository::new(state.pool());

    // A replayed idempotency key collapses onto the original order instead
    // of creating a duplicate.
    if let Some(key) = &checkout.idempotency_key
        && let Some(existing) = orders.find_by_idempotency_key(key).await?
    {
        return match existing.payment_session_url {
            Some(url) => {
                tracing::info!(
                    order_id = %existing.id,
                    "idempotency key replayed, returning existing session"
                );
                Ok(Json(CheckoutResponse { url }))
            }
            None => Err(CheckoutError::IdempotencyReplay),
        };
    }

    // Stage 3: price authority. Totals come from the catalog; the only
    // client input in the calculation is quantity.
    let references: Vec<ProductRef> = checkout.cart.iter().map(|e| e.product.clone()).collect();
    let products = ProductRepository::new(state.pool())
        .fetch_for_cart(&references)
        .await?;
    let priced = price_cart(&products, &checkout.cart)?;

    // Stage 4: order ledger. Two independent writes, no transaction.
    let order = match orders
        .insert_order(NewOrder {
            campaign_id: state.config().campaign_id,
            fundraiser_id: checkout.fundraiser.clone(),
            customer_email: checkout.email.clone(),
            customer_name: checkout.name.clone(),
            customer_phone: checkout.phone.clone(),
            total_amount: priced.total_amount,
            profit_amount: priced.profit_amount,
            idempotency_key: checkout.idempotency_key.clone(),
        })
        .await
    {
        Ok(order) => order,
        // Lost the insert race against a concurrent duplicate submission.
        Err(RepositoryError::Conflict(_)) => return Err(CheckoutError::IdempotencyReplay),
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = orders.insert_items(order.id, &priced.items).await {
        tracing::error!(
            order_id = %order.id,
            error = %e,
            "line-item write failed, order left awaiting_items"
        );
        return Err(e.into());
    }

    // Stage 5: payment session broker.
    let redirect_base = redirect_base(&headers, state.config());
    let session = match state
        .stripe()
        .create_checkout_session(&SessionParams {
            order_id: order.id,
            campaign_id: order.campaign_id,
            fundraiser_id: order.fundraiser_id.as_ref(),
            items: &priced.items,
            success_url: format!(
                "{redirect_base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"
            ),
            cancel_url: format!("{redirect_base}/checkout/cancelled"),
        })
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(
                order_id = %order.id,
                error = %e,
                "payment session creation failed, order left awaiting_payment_session"
            );
            return Err(e.into());
        }
    };

    if let Err(e) = orders
        .attach_payment_session(order.id, &session.id, &session.url)
        .await
    {
        tracing::error!(
            order_id = %order.id,
            session_id = %session.id,
            error = %e,
            "session attach failed, order left awaiting_payment_session"
        );
        return Err(e.into());
    }

    // Stage 6: donor reconciliation. Best-effort: log and move on.
    let reconciled = DonorRepository::new(state.pool())
        .upsert_for_order(
            DonorUpsert {
                campaign_id: order.campaign_id,
                email: checkout.email.clone(),
                name: checkout.name.clone(),
                phone: checkout.phone.clone(),
                preferences: checkout.preferences.clone(),
                consent_ip: Some(client_ip.0),
                order_total: priced.total_amount,
            },
            state.config().donor_totals_policy,
        )
        .await;
    match reconciled {
        Ok(donor) => {
            tracing::debug!(donor_id = %donor.id, segment = %donor.segment, "donor reconciled");
        }
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "donor reconciliation failed");
        }
    }

    // Fire-and-forget order notification.
    if let Some(notifier) = state.notifier() {
        let notifier = notifier.clone();
        let event = OrderPlacedEvent {
            event: OrderPlacedEvent::EVENT,
            order_id: order.id,
            campaign_id: order.campaign_id,
            fundraiser_id: order.fundraiser_id.as_ref().map(ToString::to_string),
            total_amount: order.total_amount,
            customer_email: order.customer_email.to_string(),
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.order_placed(&event).await {
                tracing::warn!(order_id = %event.order_id, error = %e, "order notification failed");
            }
        });
    }

    tracing::info!(
        order_id = %order.id,
        total_amount = %order.total_amount,
        "checkout session created"
    );

    Ok(Json(CheckoutResponse { url: session.url }))
}

/// Resolve the base URL for success/cancel redirects: the request's Origin
/// when it is a well-formed http(s) origin, otherwise the configured public
/// base URL.
fn redirect_base(headers: &HeaderMap, config: &CheckoutConfig) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| Url::parse(raw).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_else(|| config.base_url.trim_end_matches('/').to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::{DonorTotalsPolicy, RateLimitConfig, StripeConfig};
    use crate::routes::app;
    use pledgekit_core::CampaignId;

    fn test_config(rate_limit: RateLimitConfig) -> CheckoutConfig {
        CheckoutConfig {
            database_url: SecretString::from("postgres://localhost/pledgekit_test".to_owned()),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            base_url: "https://campaign.example.org".to_owned(),
            campaign_id: CampaignId::generate(),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_123".to_owned()),
                api_base: "https://api.stripe.com".to_owned(),
                currency: "usd".to_owned(),
            },
            rate_limit,
            donor_totals_policy: DonorTotalsPolicy::InsertOnly,
            notification_webhook_url: None,
            sentry_dsn: None,
        }
    }

    /// App wired to a lazily-connected pool: stages up to validation never
    /// touch the database, which is all these tests exercise.
    fn test_app(rate_limit: RateLimitConfig) -> axum::Router {
        let config = test_config(rate_limit);
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://localhost:1/pledgekit_test")
            .unwrap();
        app(AppState::new(config, pool).unwrap())
    }

    fn checkout_request(ip: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/checkout")
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// A payload that fails validation: rejected before any side effect, so
    /// no stage past the gate runs.
    fn invalid_body() -> serde_json::Value {
        json!({
            "cart": [],
            "customerInfo": { "email": "a@b.com" }
        })
    }

    #[tokio::test]
    async fn test_rate_limit_denies_after_capacity() {
        let app = test_app(RateLimitConfig {
            window_secs: 60,
            max_requests: 10,
        });

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(checkout_request("203.0.113.9", invalid_body()))
                .await
                .unwrap();
            // Admitted by the gate, rejected by the validator.
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app
            .clone()
            .oneshot(checkout_request("203.0.113.9", invalid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let retry_after: u64 = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap();
        assert!(retry_after > 0);
        assert!(retry_after <= 60);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("too many requests"));
    }

    #[tokio::test]
    async fn test_rate_limit_keyed_per_client() {
        let app = test_app(RateLimitConfig {
            window_secs: 60,
            max_requests: 1,
        });

        let first = app
            .clone()
            .oneshot(checkout_request("198.51.100.1", invalid_body()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = app
            .clone()
            .oneshot(checkout_request("198.51.100.1", invalid_body()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // A different client is unaffected.
        let other = app
            .clone()
            .oneshot(checkout_request("198.51.100.2", invalid_body()))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validation_failure_aggregates_all_fields() {
        let app = test_app(RateLimitConfig::default());

        let response = app
            .oneshot(checkout_request(
                "203.0.113.10",
                json!({
                    "cart": [{ "productId": "p", "quantity": 0 }],
                    "customerInfo": { "email": "nope" }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("cart[0].quantity"));
        assert!(message.contains("customerInfo.email"));
    }

    #[tokio::test]
    async fn test_cors_preflight_is_permissive() {
        let app = test_app(RateLimitConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/checkout")
                    .header("origin", "https://campaign.example.org")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app(RateLimitConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_redirect_base_prefers_origin_header() {
        let config = test_config(RateLimitConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, "https://shop.example.net".parse().unwrap());

        assert_eq!(
            redirect_base(&headers, &config),
            "https://shop.example.net"
        );
    }

    #[test]
    fn test_redirect_base_falls_back_to_config() {
        let config = test_config(RateLimitConfig::default());

        assert_eq!(
            redirect_base(&HeaderMap::new(), &config),
            "https://campaign.example.org"
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, "null".parse().unwrap());
        assert_eq!(
            redirect_base(&headers, &config),
            "https://campaign.example.org"
        );
    }
}
