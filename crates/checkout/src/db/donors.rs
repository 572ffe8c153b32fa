//! Donor reconciliation: idempotent upsert keyed by (campaign, email).
//!
//! Best-effort by contract: the caller logs and swallows failures here, so
//! a donor-write problem never fails a checkout.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use pledgekit_core::{CampaignId, DonorId, DonorSegment, Email};

use super::RepositoryError;
use crate::config::DonorTotalsPolicy;
use crate::models::Donor;
use crate::validate::DonorPreferences;

/// Inputs for a donor upsert, derived from checkout contact info.
#[derive(Debug)]
pub struct DonorUpsert {
    pub campaign_id: CampaignId,
    pub email: Email,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub preferences: DonorPreferences,
    /// Client address recorded alongside a granted marketing consent.
    pub consent_ip: Option<IpAddr>,
    /// The order total, seeding `total_donated` on first contact.
    pub order_total: Decimal,
}

/// Row shape for donor reads.
#[derive(sqlx::FromRow)]
struct DonorRow {
    id: Uuid,
    campaign_id: Uuid,
    email: String,
    name: Option<String>,
    phone: Option<String>,
    display_on_wall: bool,
    display_name: Option<String>,
    marketing_consent: bool,
    marketing_consent_at: Option<DateTime<Utc>>,
    marketing_consent_ip: Option<String>,
    segment: String,
    total_donated: Decimal,
    donation_count: i32,
    first_donation_at: DateTime<Utc>,
    last_donation_at: DateTime<Utc>,
}

impl TryFrom<DonorRow> for Donor {
    type Error = RepositoryError;

    fn try_from(row: DonorRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let segment = row.segment.parse::<DonorSegment>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid donor segment in database: {e}"))
        })?;

        Ok(Self {
            id: DonorId::new(row.id),
            campaign_id: CampaignId::new(row.campaign_id),
            email,
            name: row.name,
            phone: row.phone,
            display_on_wall: row.display_on_wall,
            display_name: row.display_name,
            marketing_consent: row.marketing_consent,
            marketing_consent_at: row.marketing_consent_at,
            marketing_consent_ip: row.marketing_consent_ip,
            segment,
            total_donated: row.total_donated,
            donation_count: row.donation_count,
            first_donation_at: row.first_donation_at,
            last_donation_at: row.last_donation_at,
        })
    }
}

const DONOR_COLUMNS: &str = r"
    id, campaign_id, email, name, phone,
    display_on_wall, display_name, marketing_consent,
    marketing_consent_at, marketing_consent_ip,
    segment, total_donated, donation_count,
    first_donation_at, last_donation_at";

/// Conflict clause shared by both policies: refresh contact and
/// consent/display fields. Consent timestamp and IP are stamped only on the
/// transition from no-consent to consent.
const CONTACT_UPDATE: &str = r"
    name = COALESCE(EXCLUDED.name, donors.name),
    phone = COALESCE(EXCLUDED.phone, donors.phone),
    display_on_wall = EXCLUDED.display_on_wall,
    display_name = COALESCE(EXCLUDED.display_name, donors.display_name),
    marketing_consent = EXCLUDED.marketing_consent,
    marketing_consent_at = CASE
        WHEN EXCLUDED.marketing_consent AND NOT donors.marketing_consent
            THEN EXCLUDED.marketing_consent_at
        ELSE donors.marketing_consent_at
    END,
    marketing_consent_ip = CASE
        WHEN EXCLUDED.marketing_consent AND NOT donors.marketing_consent
            THEN EXCLUDED.marketing_consent_ip
        ELSE donors.marketing_consent_ip
    END";

/// Additional clause under `always-accumulate-totals`.
const ACCUMULATE_UPDATE: &str = r",
    total_donated = donors.total_donated + EXCLUDED.total_donated,
    donation_count = donors.donation_count + 1,
    last_donation_at = EXCLUDED.last_donation_at,
    segment = 'repeat'";

/// Repository for donor database operations.
pub struct DonorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DonorRepository<'a> {
    /// Create a new donor repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the donor record for a freshly-placed order.
    ///
    /// First order from `(campaign, email)`: insert with `donation_count = 1`,
    /// `total_donated = order_total`, `segment = first_time`, and the given
    /// preferences. Later orders: update contact and consent/display fields;
    /// totals are touched only under
    /// [`DonorTotalsPolicy::AlwaysAccumulate`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails, or
    /// `RepositoryError::DataCorruption` if the resulting row is invalid.
    pub async fn upsert_for_order(
        &self,
        upsert: DonorUpsert,
        policy: DonorTotalsPolicy,
    ) -> Result<Donor, RepositoryError> {
        let now = Utc::now();
        let consent = upsert.preferences.marketing_consent;
        let consent_at = consent.then_some(now);
        let consent_ip = if consent {
            upsert.consent_ip.map(|ip| ip.to_string())
        } else {
            None
        };

        let update_clause = match policy {
            DonorTotalsPolicy::InsertOnly => CONTACT_UPDATE.to_owned(),
            DonorTotalsPolicy::AlwaysAccumulate => {
                format!("{CONTACT_UPDATE}{ACCUMULATE_UPDATE}")
            }
        };

        let sql = format!(
            r"
            INSERT INTO donors ({DONOR_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (campaign_id, email) DO UPDATE SET {update_clause}
            RETURNING {DONOR_COLUMNS}
            ",
        );

        let row: DonorRow = sqlx::query_as(&sql)
            .bind(DonorId::generate())
            .bind(upsert.campaign_id)
            .bind(&upsert.email)
            .bind(&upsert.name)
            .bind(&upsert.phone)
            .bind(upsert.preferences.display_on_wall)
            .bind(&upsert.preferences.display_name)
            .bind(consent)
            .bind(consent_at)
            .bind(consent_ip)
            .bind(DonorSegment::FirstTime.as_str())
            .bind(upsert.order_total)
            .bind(1_i32)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Donor::try_from(row)
    }
}
