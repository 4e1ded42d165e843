//! Billing domain errors.

use thiserror::Error;

use crate::domain::foundation::{ProductId, UserId};

/// Errors surfaced by billing commands and queries.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Product exists but is not currently sellable.
    #[error("Product not available: {0}")]
    ProductInactive(ProductId),

    /// User account does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Submitted price reference does not match the product.
    #[error("Price reference does not match product")]
    PriceMismatch,

    /// Payment provider call failed.
    #[error("Payment failed: {reason}")]
    PaymentFailed { reason: String },

    /// Webhook signature could not be verified.
    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    /// Request validation failed.
    #[error("Validation failed for '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Infrastructure failure (database, network).
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    /// Creates a payment failure error.
    pub fn payment_failed(reason: impl Into<String>) -> Self {
        BillingError::PaymentFailed {
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an infrastructure error.
    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the user-facing message.
    pub fn message(&self) -> String {
        match self {
            // Internal details stay in the logs.
            BillingError::Infrastructure(_) => "Internal error".to_string(),
            BillingError::PaymentFailed { .. } => {
                "Could not start checkout. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<crate::domain::foundation::DomainError> for BillingError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        BillingError::Infrastructure(err.to_string())
    }
}
