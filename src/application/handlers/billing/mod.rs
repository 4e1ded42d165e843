//! Billing command and query handlers.

mod check_entitlement;
mod checkout_completed;
mod list_purchases;
mod process_webhook;
mod refund;
mod start_checkout;
mod subscription_lifecycle;

pub use check_entitlement::{CheckEntitlementHandler, CheckEntitlementQuery, EntitlementAnswer};
pub use checkout_completed::CheckoutCompletedHandler;
pub use list_purchases::{ListPurchasesHandler, ListPurchasesQuery};
pub use process_webhook::{ProcessPaymentWebhookCommand, ProcessPaymentWebhookHandler};
pub use refund::RefundHandler;
pub use start_checkout::{
    CheckoutRedirects, CheckoutStarted, StartCheckoutCommand, StartCheckoutHandler,
};
pub use subscription_lifecycle::SubscriptionLifecycleHandler;
