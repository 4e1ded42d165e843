//! Entitlement resolution policy.
//!
//! Pure function over already-loaded facts; the application layer is
//! responsible for fetching them. Resolution order, first hit wins:
//!
//! 1. admin override
//! 2. effective one-time purchase of the product
//! 3. free (zero-priced) product
//! 4. entitling subscription in the product's audience space

use super::{Product, Purchase, SubscriptionRecord, UserAccount};

/// Facts consulted when resolving access for one (user, product) pair.
#[derive(Debug)]
pub struct EntitlementFacts<'a> {
    pub account: &'a UserAccount,
    pub product: &'a Product,
    /// Purchase of this product by this user, if any.
    pub purchase: Option<&'a Purchase>,
    /// All subscriptions held by this user, across both spaces.
    pub subscriptions: &'a [SubscriptionRecord],
}

/// Resolves whether the product is unlocked for the user.
pub fn is_unlocked(facts: &EntitlementFacts<'_>) -> bool {
    if facts.account.is_disabled() {
        return false;
    }

    if facts.account.is_admin {
        return true;
    }

    if facts.purchase.is_some_and(|p| p.is_effective()) {
        return true;
    }

    if facts.product.is_free() {
        return true;
    }

    facts
        .subscriptions
        .iter()
        .any(|s| s.space == facts.product.space && s.is_entitling())
}
