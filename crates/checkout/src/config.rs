//! Checkout service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string
//! - `CHECKOUT_BASE_URL` - Public URL of the campaign site (redirect fallback)
//! - `CHECKOUT_CAMPAIGN_ID` - Campaign this deployment takes orders for (UUID)
//! - `STRIPE_SECRET_KEY` - Payment provider API secret key
//!
//! ## Optional
//! - `CHECKOUT_HOST` - Bind address (default: 127.0.0.1)
//! - `CHECKOUT_PORT` - Listen port (default: 3000)
//! - `CHECKOUT_RATE_LIMIT_WINDOW_SECS` - Rate limit window (default: 60)
//! - `CHECKOUT_RATE_LIMIT_MAX_REQUESTS` - Requests per window (default: 10)
//! - `CHECKOUT_DONOR_TOTALS_POLICY` - `insert-only-totals` (default) or
//!   `always-accumulate-totals`
//! - `CHECKOUT_NOTIFICATION_WEBHOOK_URL` - Order-placed webhook target
//! - `STRIPE_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_CURRENCY` - ISO 4217 currency for ad-hoc prices (default: usd)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

use pledgekit_core::CampaignId;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Policy for donor totals on repeat orders.
///
/// The observed platform behavior seeds `total_donated`/`donation_count` on
/// the first order and leaves them untouched on later ones (totals are
/// presumed to accumulate via the payment-completion event instead). That
/// asymmetry is preserved as the default, but named and configurable so it
/// is a deployment decision rather than a hidden rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DonorTotalsPolicy {
    /// Seed totals on insert only; repeat orders update contact/consent
    /// fields and nothing else.
    #[default]
    InsertOnly,
    /// Every order adds to `total_donated` and increments `donation_count`.
    AlwaysAccumulate,
}

impl std::str::FromStr for DonorTotalsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert-only-totals" => Ok(Self::InsertOnly),
            "always-accumulate-totals" => Ok(Self::AlwaysAccumulate),
            _ => Err(format!("invalid donor totals policy: {s}")),
        }
    }
}

/// Rate limiter settings for the request gate.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Fixed window length in seconds.
    pub window_secs: u64,
    /// Requests allowed per window per client IP.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 10,
        }
    }
}

/// Payment provider (Stripe) configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// API secret key.
    pub secret_key: SecretString,
    /// API base URL (overridable for test doubles).
    pub api_base: String,
    /// ISO 4217 currency code for ad-hoc price data.
    pub currency: String,
}

/// Checkout service configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the campaign site (redirect target fallback)
    pub base_url: String,
    /// Campaign every order from this deployment is attributed to
    pub campaign_id: CampaignId,
    /// Payment provider configuration
    pub stripe: StripeConfig,
    /// Request gate settings
    pub rate_limit: RateLimitConfig,
    /// Donor totals accumulation policy
    pub donor_totals_policy: DonorTotalsPolicy,
    /// Order-placed notification webhook (disabled when unset)
    pub notification_webhook_url: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_secret_env("CHECKOUT_DATABASE_URL")?;
        let host = get_env_or_default("CHECKOUT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CHECKOUT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("CHECKOUT_BASE_URL")?;
        let campaign_id = get_required_env("CHECKOUT_CAMPAIGN_ID")?
            .parse::<CampaignId>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHECKOUT_CAMPAIGN_ID".to_string(), e.to_string())
            })?;

        let stripe = StripeConfig::from_env()?;
        let rate_limit = RateLimitConfig::from_env()?;

        let donor_totals_policy =
            get_env_or_default("CHECKOUT_DONOR_TOTALS_POLICY", "insert-only-totals")
                .parse::<DonorTotalsPolicy>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("CHECKOUT_DONOR_TOTALS_POLICY".to_string(), e)
                })?;

        let notification_webhook_url = get_optional_env("CHECKOUT_NOTIFICATION_WEBHOOK_URL");
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            campaign_id,
            stripe,
            rate_limit,
            donor_totals_policy,
            notification_webhook_url,
            sentry_dsn,
        })
    }

    /// Socket address to bind the server to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_secret_env("STRIPE_SECRET_KEY")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
            currency: get_env_or_default("STRIPE_CURRENCY", "usd"),
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let window_secs = get_env_or_default("CHECKOUT_RATE_LIMIT_WINDOW_SECS", "60")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "CHECKOUT_RATE_LIMIT_WINDOW_SECS".to_string(),
                    e.to_string(),
                )
            })?;
        let max_requests = get_env_or_default("CHECKOUT_RATE_LIMIT_MAX_REQUESTS", "10")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "CHECKOUT_RATE_LIMIT_MAX_REQUESTS".to_string(),
                    e.to_string(),
                )
            })?;

        Ok(Self {
            window_secs,
            max_requests,
        })
    }
}

/// Get a required environment variable.
fn get_required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Get a required environment variable as a secret.
fn get_secret_env(name: &str) -> Result<SecretString, ConfigError> {
    get_required_env(name).map(SecretString::from)
}

/// Get an environment variable with a default fallback.
fn get_env_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Get an optional environment variable, treating empty strings as unset.
fn get_optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_donor_totals_policy_parses() {
        assert_eq!(
            "insert-only-totals".parse::<DonorTotalsPolicy>(),
            Ok(DonorTotalsPolicy::InsertOnly)
        );
        assert_eq!(
            "always-accumulate-totals".parse::<DonorTotalsPolicy>(),
            Ok(DonorTotalsPolicy::AlwaysAccumulate)
        );
        assert!("accumulate".parse::<DonorTotalsPolicy>().is_err());
    }

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.max_requests, 10);
    }
}
