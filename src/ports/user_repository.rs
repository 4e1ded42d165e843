//! UserRepository port - billing's view of user accounts.

use async_trait::async_trait;

use crate::domain::billing::{SubscriptionStatus, UserAccount};
use crate::domain::foundation::{DomainError, UserId};

/// Port for reading and updating the billing-relevant slice of a user.
///
/// Account creation and deletion belong to the identity subsystem; this
/// port only links customers and mirrors subscription status.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find an account by its id.
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<UserAccount>, DomainError>;

    /// Find the account linked to a provider customer id.
    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<UserAccount>, DomainError>;

    /// Persist the provider customer linkage.
    ///
    /// Writing the same linkage again is a safe overwrite; webhook
    /// redelivery repeats this call.
    async fn link_customer(&self, user_id: &UserId, customer_id: &str)
        -> Result<(), DomainError>;

    /// Write the denormalized subscription status mirror.
    ///
    /// Only the subscription lifecycle handler calls this, always from the
    /// just-upserted subscription row.
    async fn set_subscription_status(
        &self,
        user_id: &UserId,
        status: SubscriptionStatus,
    ) -> Result<(), DomainError>;
}
