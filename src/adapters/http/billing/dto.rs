//! Data transfer objects for the billing HTTP API.

use serde::{Deserialize, Serialize};

use crate::domain::billing::{AudienceSpace, Purchase, PurchaseStatus};

/// Request body for `POST /checkout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    /// Provider price reference the client intends to pay.
    pub price_id: String,
    /// Product being bought.
    pub product_id: String,
    /// One-time or recurring.
    pub is_subscription: bool,
    /// Audience space the client is buying in.
    pub space: AudienceSpace,
}

/// Response body for a started checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    /// Provider-hosted checkout URL.
    pub url: String,
}

/// Response body for an entitlement check.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementResponse {
    pub unlocked: bool,
}

/// One purchase in a history listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseView {
    pub product_id: String,
    pub status: PurchaseStatus,
    pub space: AudienceSpace,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Purchase> for PurchaseView {
    fn from(purchase: Purchase) -> Self {
        Self {
            product_id: purchase.product_id.to_string(),
            status: purchase.status,
            space: purchase.space,
            created_at: *purchase.created_at.as_datetime(),
        }
    }
}

/// Response body for a purchase history listing.
#[derive(Debug, Clone, Serialize)]
pub struct PurchasesResponse {
    pub purchases: Vec<PurchaseView>,
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
