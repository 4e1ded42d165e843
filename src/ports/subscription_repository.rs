//! SubscriptionRepository port - provider-keyed subscription mirror.

use async_trait::async_trait;

use crate::domain::billing::{AudienceSpace, SubscriptionRecord};
use crate::domain::foundation::{DomainError, UserId};

/// Result of attempting to upsert a subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was written (insert or newer overwrite).
    Applied,
    /// The stored row carries a newer event timestamp; nothing changed.
    Stale,
}

/// Port for the local mirror of provider subscriptions.
///
/// Rows are keyed by the provider subscription id. Implementations must
/// guard the overwrite on the event timestamp (single-row compare-and-set)
/// so out-of-order delivery cannot roll a subscription back to an older
/// state.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Upsert the record unless the stored row is newer.
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<UpsertOutcome, DomainError>;

    /// Find a subscription by its provider id.
    async fn find_by_id(&self, subscription_id: &str)
        -> Result<Option<SubscriptionRecord>, DomainError>;

    /// All subscriptions held by a user, across both spaces.
    async fn list_for_user(&self, user_id: &UserId)
        -> Result<Vec<SubscriptionRecord>, DomainError>;

    /// Subscriptions held by a user in one space.
    async fn list_for_user_in_space(
        &self,
        user_id: &UserId,
        space: AudienceSpace,
    ) -> Result<Vec<SubscriptionRecord>, DomainError>;
}
