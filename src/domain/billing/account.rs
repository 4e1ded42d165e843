//! User account as seen by the billing subsystem.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::SubscriptionStatus;

/// Identity record owning billing state.
///
/// # Invariants
///
/// - `customer_id` is set at most once per account, lazily on first
///   checkout; re-persisting the same linkage is a safe overwrite.
/// - `subscription_status` is a denormalized mirror of that user's
///   subscription row. It is only ever written by the subscription
///   lifecycle handler, never settable independently.
/// - Accounts are never deleted, only soft-disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique identifier.
    pub id: UserId,

    /// Email, used when a provider customer record is lazily created.
    pub email: String,

    /// Payment provider customer id (cus_...), if linked.
    pub customer_id: Option<String>,

    /// Mirror of the latest applied subscription status.
    pub subscription_status: Option<SubscriptionStatus>,

    /// Operator override: admins see everything.
    pub is_admin: bool,

    /// Soft-disable marker; disabled accounts keep their history.
    pub disabled_at: Option<Timestamp>,

    /// When the account was registered.
    pub created_at: Timestamp,
}

impl UserAccount {
    /// Returns true if the account has been soft-disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }
}
