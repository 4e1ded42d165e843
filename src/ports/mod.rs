//! Ports - async trait contracts between the application core and the
//! outside world (store, payment provider).

mod payment_provider;
mod pending_checkout_repository;
mod product_repository;
mod purchase_repository;
mod subscription_repository;
mod user_repository;
mod webhook_event_repository;

pub use payment_provider::{
    CheckoutMode, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PaymentError, PaymentErrorCode, PaymentProvider,
};
pub use pending_checkout_repository::{PendingCheckout, PendingCheckoutRepository};
pub use product_repository::ProductRepository;
pub use purchase_repository::{InsertOutcome, PurchaseRepository};
pub use subscription_repository::{SubscriptionRepository, UpsertOutcome};
pub use user_repository::UserRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
