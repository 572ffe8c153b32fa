//! Donor model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pledgekit_core::{CampaignId, DonorId, DonorSegment, Email};

/// A per-campaign donor contact record, unique on `(campaign_id, email)`.
///
/// Created on a campaign's first order from an email; updated, never
/// duplicated, on subsequent orders. Whether repeat orders touch
/// `total_donated`/`donation_count` is governed by
/// [`crate::config::DonorTotalsPolicy`].
#[derive(Debug, Clone)]
pub struct Donor {
    pub id: DonorId,
    pub campaign_id: CampaignId,
    pub email: Email,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub display_on_wall: bool,
    pub display_name: Option<String>,
    pub marketing_consent: bool,
    pub marketing_consent_at: Option<DateTime<Utc>>,
    pub marketing_consent_ip: Option<String>,
    pub segment: DonorSegment,
    pub total_donated: Decimal,
    pub donation_count: i32,
    pub first_donation_at: DateTime<Utc>,
    pub last_donation_at: DateTime<Utc>,
}
