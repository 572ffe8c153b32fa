//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::CheckoutConfig;
use crate::gate::FixedWindowLimiter;
use crate::services::NotificationClient;
use crate::stripe::{StripeClient, StripeError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool, the payment provider client,
/// and the request gate.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    pool: PgPool,
    stripe: StripeClient,
    limiter: FixedWindowLimiter,
    notifier: Option<NotificationClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Checkout service configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the payment provider client cannot be built.
    pub fn new(config: CheckoutConfig, pool: PgPool) -> Result<Self, StripeError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let limiter = FixedWindowLimiter::new(config.rate_limit);
        let notifier = config
            .notification_webhook_url
            .clone()
            .map(NotificationClient::new);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                limiter,
                notifier,
            }),
        })
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the request gate.
    #[must_use]
    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.inner.limiter
    }

    /// Get a reference to the notification client, when configured.
    #[must_use]
    pub fn notifier(&self) -> Option<&NotificationClient> {
        self.inner.notifier.as_ref()
    }
}
