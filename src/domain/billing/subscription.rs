//! Subscription facts mirrored from the payment provider.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::AudienceSpace;

/// Subscription status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    /// Status string we do not recognize; never entitles.
    Unknown,
}

impl SubscriptionStatus {
    /// Parse the provider's status string.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }

    /// The entitling set. This is a policy decision, kept in one place.
    /// `past_due` is not in the set.
    pub fn entitles(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical local mirror of one provider subscription.
///
/// Keyed by the provider's subscription id, which is the natural
/// idempotency key: redelivery of the same logical state is a no-op
/// overwrite. `event_ts` carries the provider event timestamp so that a
/// stale event arriving late cannot roll the row back (compare-and-set in
/// the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Provider subscription id (sub_...), the primary key.
    pub id: String,

    /// Owning user, resolved via the provider customer id.
    pub user_id: UserId,

    /// Current status.
    pub status: SubscriptionStatus,

    /// Provider price reference (price_...).
    pub price_ref: String,

    /// Seat count.
    pub quantity: u32,

    /// Whether the subscription is set to cancel when the period ends.
    pub cancel_at_period_end: bool,

    /// Current billing period start.
    pub current_period_start: Timestamp,

    /// Current billing period end.
    pub current_period_end: Timestamp,

    /// Audience space this subscription covers.
    pub space: AudienceSpace,

    /// Provider metadata carried on the subscription object.
    pub metadata: HashMap<String, String>,

    /// Provider event timestamp of the last applied update.
    pub event_ts: Timestamp,
}

impl SubscriptionRecord {
    /// Returns true if this subscription entitles access in its space.
    pub fn is_entitling(&self) -> bool {
        self.status.entitles()
    }
}
