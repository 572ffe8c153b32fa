//! Checkout payload schema validation.
//!
//! Validates the raw request before any side effect occurs. Violations are
//! collected as structured `{field, code, message}` triples - the whole
//! payload is checked and every problem reported in one response, not just
//! the first. The aggregated list flattens to a single string only at the
//! HTTP boundary.
//!
//! Monetary fields are deliberately absent from the wire types: a client
//! cannot submit a price, only a product reference and a quantity. Spurious
//! price-like fields in the JSON are dropped by deserialization.

use serde::Deserialize;

use pledgekit_core::{Email, FundraiserRef, ProductRef};

/// Maximum number of cart entries per checkout.
pub const MAX_CART_ENTRIES: usize = 50;
/// Maximum quantity per cart entry.
pub const MAX_QUANTITY: i64 = 100_000;
/// Maximum customer name length.
pub const MAX_NAME_LENGTH: usize = 100;
/// Maximum customer phone length.
pub const MAX_PHONE_LENGTH: usize = 20;
/// Maximum donor display name length.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;
/// Maximum idempotency key length.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 64;

// =============================================================================
// Wire types
// =============================================================================

/// Raw checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub fundraiser_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub cart: Vec<CartEntry>,
    pub customer_info: CustomerInfo,
    #[serde(default)]
    pub donor_preferences: DonorPreferences,
}

/// One untrusted cart entry. Quantity is the only client input that reaches
/// the monetary calculation; any price field a client attaches is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub product_id: String,
    pub quantity: i64,
}

/// Customer contact details.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Donor display and consent preferences.
///
/// A closed type: every recognized option is enumerated with its default,
/// and unrecognized keys are rejected rather than silently carried along.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DonorPreferences {
    pub display_on_wall: bool,
    pub display_name: Option<String>,
    pub marketing_consent: bool,
}

impl Default for DonorPreferences {
    fn default() -> Self {
        Self {
            display_on_wall: true,
            display_name: None,
            marketing_consent: false,
        }
    }
}

// =============================================================================
// Validation errors
// =============================================================================

/// A single violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON path of the offending field, e.g. `cart[2].quantity`.
    pub field: String,
    /// Stable machine-readable code, e.g. `out_of_range`.
    pub code: &'static str,
    /// Human-readable reason.
    pub message: String,
}

/// Aggregated validation failure: every violated field with its reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, code: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            code,
            message: message.into(),
        });
    }

    /// Whether any violation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded violations.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }
}

impl std::fmt::Display for ValidationErrors {
    /// Flatten to the single aggregated message sent over HTTP.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Validated output
// =============================================================================

/// A cart entry whose product reference and quantity passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedCartEntry {
    pub product: ProductRef,
    pub quantity: i64,
}

/// A checkout request that passed schema validation.
#[derive(Debug)]
pub struct ValidatedCheckout {
    pub fundraiser: Option<FundraiserRef>,
    pub idempotency_key: Option<String>,
    pub cart: Vec<ValidatedCartEntry>,
    pub email: Email,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub preferences: DonorPreferences,
}

/// Validate a raw checkout request against the schema.
///
/// All rules are checked; the error carries every violation.
///
/// # Errors
///
/// Returns [`ValidationErrors`] listing each violated field and reason.
pub fn validate(request: CheckoutRequest) -> Result<ValidatedCheckout, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let fundraiser = match &request.fundraiser_id {
        Some(raw) => match FundraiserRef::parse(raw) {
            Ok(r) => Some(r),
            Err(e) => {
                errors.push("fundraiserId", "invalid_reference", e.to_string());
                None
            }
        },
        None => None,
    };

    if let Some(key) = &request.idempotency_key
        && (key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LENGTH)
    {
        errors.push(
            "idempotencyKey",
            "invalid_length",
            format!("must be 1-{MAX_IDEMPOTENCY_KEY_LENGTH} characters"),
        );
    }

    if request.cart.is_empty() {
        errors.push("cart", "empty", "must contain at least one item");
    } else if request.cart.len() > MAX_CART_ENTRIES {
        errors.push(
            "cart",
            "too_many_entries",
            format!("must contain at most {MAX_CART_ENTRIES} items"),
        );
    }

    let mut cart = Vec::with_capacity(request.cart.len());
    for (i, entry) in request.cart.iter().enumerate() {
        let product = match ProductRef::parse(&entry.product_id) {
            Ok(p) => Some(p),
            Err(e) => {
                errors.push(
                    format!("cart[{i}].productId"),
                    "invalid_reference",
                    e.to_string(),
                );
                None
            }
        };

        if !(1..=MAX_QUANTITY).contains(&entry.quantity) {
            errors.push(
                format!("cart[{i}].quantity"),
                "out_of_range",
                format!("must be between 1 and {MAX_QUANTITY}"),
            );
        }

        if let Some(product) = product {
            cart.push(ValidatedCartEntry {
                product,
                quantity: entry.quantity,
            });
        }
    }

    let email = match Email::parse(request.customer_info.email.trim()) {
        Ok(e) => Some(e),
        Err(e) => {
            errors.push("customerInfo.email", "invalid_email", e.to_string());
            None
        }
    };

    if let Some(name) = &request.customer_info.name
        && name.len() > MAX_NAME_LENGTH
    {
        errors.push(
            "customerInfo.name",
            "too_long",
            format!("must be at most {MAX_NAME_LENGTH} characters"),
        );
    }

    if let Some(phone) = &request.customer_info.phone
        && phone.len() > MAX_PHONE_LENGTH
    {
        errors.push(
            "customerInfo.phone",
            "too_long",
            format!("must be at most {MAX_PHONE_LENGTH} characters"),
        );
    }

    if let Some(display_name) = &request.donor_preferences.display_name
        && display_name.len() > MAX_DISPLAY_NAME_LENGTH
    {
        errors.push(
            "donorPreferences.displayName",
            "too_long",
            format!("must be at most {MAX_DISPLAY_NAME_LENGTH} characters"),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Invariant: no errors means email parsed and every cart entry survived.
    let Some(email) = email else {
        return Err(errors);
    };

    Ok(ValidatedCheckout {
        fundraiser,
        idempotency_key: request.idempotency_key,
        cart,
        email,
        name: request.customer_info.name,
        phone: request.customer_info.phone,
        preferences: request.donor_preferences,
    })
}
