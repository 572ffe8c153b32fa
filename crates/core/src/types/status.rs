//! Status enums for orders and donors.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// The order-intake pipeline persists in multiple independent writes with no
/// enclosing transaction, so the status records exactly how far an order got:
///
/// ```text
/// awaiting_items -> awaiting_payment_session -> awaiting_completion -> completed
///                                                                   \> cancelled
/// ```
///
/// Orders stuck in an early state past a TTL are orphans; a reconciliation
/// sweep (separate process) cancels or retries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order row committed; line items not yet written.
    #[default]
    AwaitingItems,
    /// Line items committed; no payment session yet.
    AwaitingPaymentSession,
    /// Payment session attached; awaiting the provider's completion event.
    AwaitingCompletion,
    /// Payment completed (driven by the external completion notification).
    Completed,
    /// Cancelled by the payer or the reconciliation sweep.
    Cancelled,
}

impl OrderStatus {
    /// Stable string form as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingItems => "awaiting_items",
            Self::AwaitingPaymentSession => "awaiting_payment_session",
            Self::AwaitingCompletion => "awaiting_completion",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_items" => Ok(Self::AwaitingItems),
            "awaiting_payment_session" => Ok(Self::AwaitingPaymentSession),
            "awaiting_completion" => Ok(Self::AwaitingCompletion),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Donor engagement segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DonorSegment {
    /// First order seen from this (campaign, email) pair.
    #[default]
    FirstTime,
    /// At least one prior order from this pair.
    Repeat,
}

impl DonorSegment {
    /// Stable string form as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstTime => "first_time",
            Self::Repeat => "repeat",
        }
    }
}

impl std::fmt::Display for DonorSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DonorSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_time" => Ok(Self::FirstTime),
            "repeat" => Ok(Self::Repeat),
            _ => Err(format!("invalid donor segment: {s}")),
        }
    }
}
