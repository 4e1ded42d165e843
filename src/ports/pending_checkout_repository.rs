//! PendingCheckoutRepository port - session-id fallback for reconciliation.
//!
//! Provider metadata is the primary link between a completed checkout and
//! the local product, but metadata can be truncated or dropped. A pending
//! checkout record is persisted before the user is redirected, keyed by
//! the provider session id, and consulted by the completion handler when
//! metadata is missing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::AudienceSpace;
use crate::domain::foundation::{DomainError, ProductId, Timestamp, UserId};

/// Business context captured at session creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    /// Provider session id (cs_...), the key.
    pub session_id: String,

    /// User who started the checkout.
    pub user_id: UserId,

    /// Product being bought.
    pub product_id: ProductId,

    /// Audience space of the product.
    pub space: AudienceSpace,

    /// Whether this is a recurring checkout.
    pub is_subscription: bool,

    /// When the session was created.
    pub created_at: Timestamp,
}

/// Port for storing pending checkout records.
#[async_trait]
pub trait PendingCheckoutRepository: Send + Sync {
    /// Save a pending checkout, overwriting any record for the same session.
    async fn save(&self, pending: &PendingCheckout) -> Result<(), DomainError>;

    /// Find a pending checkout by provider session id.
    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingCheckout>, DomainError>;
}
