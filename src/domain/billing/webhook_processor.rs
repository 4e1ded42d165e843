//! Webhook processor - Orchestrates idempotent webhook event handling.
//!
//! Coordination layer between verified provider events and the
//! reconciliation handlers, ensuring each event is applied at most once.
//!
//! ## Design
//!
//! 1. Check if the event was already processed (idempotency)
//! 2. Dispatch to the handler registered for the event type
//! 3. Record the processing result (success, ignored, or failed)
//!
//! ## Race Condition Handling
//!
//! Deliveries are handled by independent invocations with no in-process
//! coordination, so two copies of the same event can race. First to save
//! wins (PRIMARY KEY on event id); the loser observes `AlreadyExists` and
//! reports `AlreadyProcessed`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult};

use super::stripe_event::{StripeEvent, StripeEventType};
use super::webhook_errors::WebhookError;

/// Handler for one kind of provider webhook event.
///
/// Implementations must be stateless and idempotent: the provider
/// delivers at least once, and two deliveries of the same event may be
/// processed concurrently.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    /// Returns the event type(s) this handler processes.
    fn handles(&self) -> Vec<StripeEventType>;

    /// Handles the webhook event.
    ///
    /// Returns `Ok(())` on success.
    /// Returns `Err(WebhookError::Ignored(_))` if the event should be
    /// acknowledged but not applied.
    /// Returns other `Err` variants for genuinely retriable failures.
    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError>;
}

/// Dispatches webhook events to the appropriate handler.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// Find a handler for the given event type.
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler>;

    /// Dispatch an event to its handler.
    ///
    /// Unknown event types resolve to `Ignored` so the provider stops
    /// retrying an event we will never understand.
    async fn dispatch(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let event_type = event.parsed_type();
        match self.get_handler(&event_type) {
            Some(handler) => handler.handle(event).await,
            None => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "No handler registered for event type"
                );
                Err(WebhookError::Ignored(format!(
                    "no handler for event type {}",
                    event.event_type
                )))
            }
        }
    }
}

/// Registry-backed dispatcher over a fixed set of handlers.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn WebhookEventHandler>>,
}

impl HandlerRegistry {
    /// Creates a registry from the given handlers.
    pub fn new(handlers: Vec<Arc<dyn WebhookEventHandler>>) -> Self {
        Self { handlers }
    }
}

impl WebhookDispatcher for HandlerRegistry {
    fn get_handler(&self, event_type: &StripeEventType) -> Option<&dyn WebhookEventHandler> {
        self.handlers
            .iter()
            .find(|h| h.handles().contains(event_type))
            .map(|h| h.as_ref())
    }
}

/// Processes webhook events with idempotency guarantees.
pub struct IdempotentWebhookProcessor<D: WebhookDispatcher> {
    repository: Arc<dyn WebhookEventRepository>,
    dispatcher: D,
}

impl<D: WebhookDispatcher> IdempotentWebhookProcessor<D> {
    /// Creates a new processor with the given repository and dispatcher.
    pub fn new(repository: Arc<dyn WebhookEventRepository>, dispatcher: D) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Process a webhook event at most once.
    ///
    /// # Returns
    ///
    /// - `Ok(WebhookResult::Processed)` - applied (or recorded as ignored)
    /// - `Ok(WebhookResult::AlreadyProcessed)` - duplicate delivery, skipped
    /// - `Err(_)` - processing failed; the record is saved as failed and
    ///   the provider is asked to redeliver
    pub async fn process(&self, event: StripeEvent) -> Result<WebhookResult, WebhookError> {
        if let Some(previous) = self.repository.find_by_event_id(&event.id).await? {
            // A failed record means the handler never applied its effect;
            // the redelivery must be allowed through or the event is lost.
            if previous.result != "failed" {
                tracing::debug!(event_id = %event.id, "Duplicate webhook delivery skipped");
                return Ok(WebhookResult::AlreadyProcessed);
            }
            tracing::info!(event_id = %event.id, "Retrying previously failed webhook event");
        }

        let result = self.dispatcher.dispatch(&event).await;

        let payload = serde_json::to_value(&event)
            .map_err(|e| WebhookError::ParseError(format!("failed to serialize event: {}", e)))?;

        let record = match &result {
            Ok(()) => WebhookEventRecord::success(&event.id, &event.event_type, payload),
            Err(WebhookError::Ignored(reason)) => {
                WebhookEventRecord::ignored(&event.id, &event.event_type, reason, payload)
            }
            Err(e) => {
                WebhookEventRecord::failed(&event.id, &event.event_type, e.to_string(), payload)
            }
        };

        match self.repository.save(record).await? {
            SaveResult::Inserted => match result {
                Ok(()) => Ok(WebhookResult::Processed),
                // Ignored events are still "processed" from the
                // idempotency perspective.
                Err(WebhookError::Ignored(_)) => Ok(WebhookResult::Processed),
                Err(e) => Err(e),
            },
            SaveResult::AlreadyExists => {
                // Lost the race; another invocation handled it.
                Ok(WebhookResult::AlreadyProcessed)
            }
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Store(err.to_string())
    }
}
