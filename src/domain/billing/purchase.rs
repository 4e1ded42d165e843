//! One-time purchase facts.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ProductId, PurchaseId, Timestamp, UserId};

use super::AudienceSpace;

/// Status of a recorded purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Payment captured; the purchase grants access.
    Paid,
    /// Payment was refunded; access is revoked.
    Refunded,
}

impl PurchaseStatus {
    /// Parse from the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

/// A one-time, perpetual-access grant.
///
/// Purchases are append-only facts created exclusively by the checkout
/// completion handler. The only mutation ever applied is the status
/// transition to `Refunded`. Redelivered events must not create a second
/// effective fact: the store enforces uniqueness on
/// `(user_id, product_id, provider_ref)` and inserts are insert-or-ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique identifier.
    pub id: PurchaseId,

    /// Purchasing user.
    pub user_id: UserId,

    /// Purchased product.
    pub product_id: ProductId,

    /// Purchase status.
    pub status: PurchaseStatus,

    /// Payment provider reference (payment intent id, pi_...).
    pub provider_ref: String,

    /// Audience space the purchase was made in.
    pub space: AudienceSpace,

    /// When the purchase fact was recorded.
    pub created_at: Timestamp,
}

impl Purchase {
    /// Creates a new paid purchase fact.
    pub fn paid(
        user_id: UserId,
        product_id: ProductId,
        provider_ref: impl Into<String>,
        space: AudienceSpace,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            user_id,
            product_id,
            status: PurchaseStatus::Paid,
            provider_ref: provider_ref.into(),
            space,
            created_at: Timestamp::now(),
        }
    }

    /// Returns true if this purchase currently grants access.
    pub fn is_effective(&self) -> bool {
        self.status == PurchaseStatus::Paid
    }
}
