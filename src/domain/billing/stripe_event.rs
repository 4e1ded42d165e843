//! Payment provider webhook event types.
//!
//! Defines the event envelope and the payload objects we reconcile
//! against. Only fields relevant to our processing are captured; the rest
//! of the provider's schema is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Webhook event envelope (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    ///
    /// This is the ordering authority for subscription upserts; arrival
    /// order carries no meaning.
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Known event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripeEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Subscription was created.
    CustomerSubscriptionCreated,
    /// Subscription was updated.
    CustomerSubscriptionUpdated,
    /// Subscription was deleted (arrives with status "canceled").
    CustomerSubscriptionDeleted,
    /// A charge was refunded.
    ChargeRefunded,
    /// Unknown or unhandled event type.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        }
    }

    /// Convert to the provider's event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::ChargeRefunded => "charge.refunded",
            Self::Unknown => "unknown",
        }
    }

    /// The three lifecycle types share one reconciliation path.
    pub fn is_subscription_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::CustomerSubscriptionCreated
                | Self::CustomerSubscriptionUpdated
                | Self::CustomerSubscriptionDeleted
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payload objects
// ════════════════════════════════════════════════════════════════════════════════

/// Checkout session object as delivered in `checkout.session.completed`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    /// Session id (cs_...).
    pub id: String,

    /// "payment" for one-time purchases, "subscription" for recurring.
    pub mode: String,

    /// Provider customer id, if one was created or attached.
    pub customer: Option<String>,

    /// Payment intent id for one-time payments (pi_...).
    pub payment_intent: Option<String>,

    /// Subscription id for recurring checkouts (sub_...).
    pub subscription: Option<String>,

    /// Session metadata set at creation time. Carries
    /// `user_id` / `product_id` / `space` for reconciliation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// Returns true for one-time payment sessions.
    pub fn is_one_time(&self) -> bool {
        self.mode == "payment"
    }
}

/// Subscription object as delivered in `customer.subscription.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    /// Subscription id (sub_...).
    pub id: String,

    /// Provider customer id (cus_...).
    pub customer: String,

    /// Provider status string.
    pub status: String,

    /// Whether the subscription cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Current period start, provider epoch seconds.
    pub current_period_start: i64,

    /// Current period end, provider epoch seconds.
    pub current_period_end: i64,

    /// Subscription metadata. Carries `space`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Line items; the first item carries the price and quantity.
    pub items: SubscriptionItemList,
}

impl SubscriptionObject {
    /// Price reference of the first line item, if present.
    pub fn price_ref(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    /// Quantity of the first line item, defaulting to one seat.
    pub fn quantity(&self) -> u32 {
        self.items
            .data
            .first()
            .and_then(|item| item.quantity)
            .unwrap_or(1)
    }
}

/// List wrapper around subscription items.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// One subscription line item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    pub price: PriceRef,
    pub quantity: Option<u32>,
}

/// Price reference within a line item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceRef {
    pub id: String,
}

/// Charge object as delivered in `charge.refunded`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChargeObject {
    /// Charge id (ch_...).
    pub id: String,

    /// Payment intent this charge belongs to (pi_...).
    pub payment_intent: Option<String>,

    /// Whether the charge has been fully refunded.
    #[serde(default)]
    pub refunded: bool,
}

/// Builder for creating test events.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: 1_704_067_200,
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> StripeEvent {
        StripeEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: StripeEventData {
                object: self.object,
                previous_attributes: None,
            },
            livemode: self.livemode,
        }
    }
}
