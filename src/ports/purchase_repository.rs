//! PurchaseRepository port - append-only purchase facts.

use async_trait::async_trait;

use crate::domain::billing::{Purchase, PurchaseStatus};
use crate::domain::foundation::{DomainError, ProductId, UserId};

/// Result of attempting to insert a purchase fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Fact was recorded (first delivery).
    Inserted,
    /// An identical fact already exists (redelivered event).
    Duplicate,
}

/// Port for storing and querying one-time purchase facts.
///
/// Implementations must enforce uniqueness on
/// `(user_id, product_id, provider_ref)` so that redelivered
/// checkout-completed events cannot create a second effective fact.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Insert a purchase fact unless an identical one exists.
    ///
    /// Uses insert-or-ignore semantics keyed by
    /// `(user_id, product_id, provider_ref)`; concurrent duplicate
    /// deliveries resolve at the store, not in application code.
    async fn insert_if_absent(&self, purchase: &Purchase) -> Result<InsertOutcome, DomainError>;

    /// Find the effective (paid) purchase of a product by a user, if any.
    async fn find_effective(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<Purchase>, DomainError>;

    /// List all purchase facts for a user, newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError>;

    /// Transition the status of every purchase carrying the provider
    /// reference. Returns the number of rows changed.
    ///
    /// Used by the refund path; repeating the call is a no-op.
    async fn set_status_by_provider_ref(
        &self,
        provider_ref: &str,
        status: PurchaseStatus,
    ) -> Result<u64, DomainError>;
}
