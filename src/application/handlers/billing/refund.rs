//! RefundHandler - reconciles `charge.refunded` when refunds are enabled.
//!
//! Whether a refund revokes access is business policy, not a technical
//! question, so the behavior ships behind `refunds_enabled` (default off).
//! When disabled the event is acknowledged and recorded as ignored, which
//! preserves the payload for a later backfill if policy changes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::billing::{
    ChargeObject, PurchaseStatus, StripeEvent, StripeEventType, WebhookError, WebhookEventHandler,
};
use crate::ports::PurchaseRepository;

/// Handler for charge refund events.
pub struct RefundHandler {
    purchases: Arc<dyn PurchaseRepository>,
    refunds_enabled: bool,
}

impl RefundHandler {
    pub fn new(purchases: Arc<dyn PurchaseRepository>, refunds_enabled: bool) -> Self {
        Self {
            purchases,
            refunds_enabled,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for RefundHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::ChargeRefunded]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        if !self.refunds_enabled {
            return Err(WebhookError::Ignored(
                "refund handling is disabled".to_string(),
            ));
        }

        let charge: ChargeObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(format!("invalid charge: {}", e)))?;

        if !charge.refunded {
            // Partial refunds keep the purchase effective.
            return Err(WebhookError::Ignored(format!(
                "charge {} not fully refunded",
                charge.id
            )));
        }

        let Some(payment_intent) = charge.payment_intent else {
            return Err(WebhookError::Ignored(format!(
                "charge {} has no payment intent",
                charge.id
            )));
        };

        let changed = self
            .purchases
            .set_status_by_provider_ref(&payment_intent, PurchaseStatus::Refunded)
            .await?;

        if changed == 0 {
            tracing::warn!(
                payment_intent = %payment_intent,
                "Refund received for a payment with no recorded purchase"
            );
        } else {
            tracing::info!(
                payment_intent = %payment_intent,
                purchases = changed,
                "Purchase access revoked by refund"
            );
        }

        Ok(())
    }
}
