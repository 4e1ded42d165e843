//! Webhook error types.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics. Status codes
//! drive the provider's redelivery behavior, so the mapping is load-bearing:
//! only genuinely transient faults may return 5xx.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Event was intentionally ignored (not an error condition).
    ///
    /// Covers unknown event types, events referencing a customer no local
    /// user owns, and payloads missing the metadata needed to reconcile.
    /// Retrying will never fix any of these, so they are acknowledged.
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Durable store operation failed; the provider should redeliver.
    #[error("Store error: {0}")]
    Store(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(_))
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: rejected, no retry
    /// - 5xx: transient, provider will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::InvalidTimestamp | WebhookError::ParseError(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Ignored(_) => StatusCode::OK,
            WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
