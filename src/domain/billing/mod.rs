//! Billing domain - products, purchases, subscriptions, entitlements and
//! the webhook reconciliation pipeline.

mod account;
mod entitlement;
mod errors;
mod product;
mod purchase;
mod stripe_event;
mod subscription;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use account::UserAccount;
pub use entitlement::{is_unlocked, EntitlementFacts};
pub use errors::BillingError;
pub use product::{AudienceSpace, Product, ProductKind};
pub use purchase::{Purchase, PurchaseStatus};
pub use stripe_event::{
    ChargeObject, CheckoutSessionObject, PriceRef, StripeEvent, StripeEventData, StripeEventType,
    SubscriptionItem, SubscriptionItemList, SubscriptionObject,
};
pub use subscription::{SubscriptionRecord, SubscriptionStatus};
pub use webhook_errors::WebhookError;
pub use webhook_processor::{
    HandlerRegistry, IdempotentWebhookProcessor, WebhookDispatcher, WebhookEventHandler,
};
pub use webhook_verifier::{hex_encode, SignatureHeader, StripeWebhookVerifier};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
#[cfg(test)]
pub use webhook_verifier::compute_test_signature;
