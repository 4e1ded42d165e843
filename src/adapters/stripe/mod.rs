//! Stripe adapter - `PaymentProvider` implementation.

mod stripe_adapter;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
