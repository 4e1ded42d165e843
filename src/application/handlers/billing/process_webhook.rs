//! ProcessPaymentWebhookHandler - ingress for provider webhook deliveries.
//!
//! Verification runs over the raw bytes before anything else; a payload
//! that fails the signature check never reaches JSON parsing or the
//! dispatcher. Verified events flow through the idempotent processor so
//! duplicate deliveries are absorbed even when they race.

use std::sync::Arc;

use crate::domain::billing::{
    HandlerRegistry, IdempotentWebhookProcessor, StripeWebhookVerifier, WebhookError,
    WebhookEventHandler,
};
use crate::ports::{WebhookEventRepository, WebhookResult};

/// Command carrying one raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessPaymentWebhookCommand {
    /// Raw, unparsed request body. Signatures are computed over exact
    /// bytes, so this must not be re-serialized upstream.
    pub payload: Vec<u8>,
    /// Value of the signature header.
    pub signature: String,
}

/// Handler wiring verification, idempotency and dispatch together.
pub struct ProcessPaymentWebhookHandler {
    verifier: StripeWebhookVerifier,
    processor: IdempotentWebhookProcessor<HandlerRegistry>,
}

impl ProcessPaymentWebhookHandler {
    pub fn new(
        verifier: StripeWebhookVerifier,
        events: Arc<dyn WebhookEventRepository>,
        handlers: Vec<Arc<dyn WebhookEventHandler>>,
    ) -> Self {
        Self {
            verifier,
            processor: IdempotentWebhookProcessor::new(events, HandlerRegistry::new(handlers)),
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessPaymentWebhookCommand,
    ) -> Result<WebhookResult, WebhookError> {
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Webhook verified"
        );

        self.processor.process(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{compute_test_signature, StripeEvent, StripeEventType};
    use crate::domain::foundation::DomainError;
    use crate::ports::{SaveResult, WebhookEventRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::RwLock;

    const TEST_SECRET: &str = "whsec_process_test";

    struct MockWebhookRepository {
        records: RwLock<HashMap<String, WebhookEventRecord>>,
    }

    impl MockWebhookRepository {
        fn new() -> Self {
            Self {
                records: RwLock::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl WebhookEventRepository for MockWebhookRepository {
        async fn find_by_event_id(
            &self,
            event_id: &str,
        ) -> Result<Option<WebhookEventRecord>, DomainError> {
            Ok(self.records.read().await.get(event_id).cloned())
        }

        async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
            let mut records = self.records.write().await;
            match records.get(&record.event_id) {
                Some(existing) if existing.result != "failed" => Ok(SaveResult::AlreadyExists),
                _ => {
                    records.insert(record.event_id.clone(), record);
                    Ok(SaveResult::Inserted)
                }
            }
        }

        async fn delete_before(
            &self,
            _timestamp: chrono::DateTime<chrono::Utc>,
        ) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    struct CountingHandler {
        calls: AtomicU32,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WebhookEventHandler for CountingHandler {
        fn handles(&self) -> Vec<StripeEventType> {
            vec![StripeEventType::CheckoutSessionCompleted]
        }

        async fn handle(&self, _event: &StripeEvent) -> Result<(), WebhookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn signed_command(payload: &str) -> ProcessPaymentWebhookCommand {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_test_signature(TEST_SECRET, timestamp, payload);
        ProcessPaymentWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: format!("t={},v1={}", timestamp, signature),
        }
    }

    fn event_payload(event_id: &str) -> String {
        serde_json::json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "created": chrono::Utc::now().timestamp(),
            "data": {"object": {}},
            "livemode": false
        })
        .to_string()
    }

    fn handler(counting: Arc<CountingHandler>) -> ProcessPaymentWebhookHandler {
        ProcessPaymentWebhookHandler::new(
            StripeWebhookVerifier::new(TEST_SECRET),
            Arc::new(MockWebhookRepository::new()),
            vec![counting],
        )
    }

    #[tokio::test]
    async fn verified_event_reaches_its_handler() {
        let counting = Arc::new(CountingHandler::new());
        let h = handler(counting.clone());

        let result = h.handle(signed_command(&event_payload("evt_ok"))).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_signature_never_reaches_the_dispatcher() {
        let counting = Arc::new(CountingHandler::new());
        let h = handler(counting.clone());

        let cmd = ProcessPaymentWebhookCommand {
            payload: event_payload("evt_forged").into_bytes(),
            signature: format!(
                "t={},v1={}",
                chrono::Utc::now().timestamp(),
                "a".repeat(64)
            ),
        };
        let result = h.handle(cmd).await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_absorbed() {
        let counting = Arc::new(CountingHandler::new());
        let h = handler(counting.clone());
        let payload = event_payload("evt_dup");

        let first = h.handle(signed_command(&payload)).await.unwrap();
        let second = h.handle(signed_command(&payload)).await.unwrap();

        assert_eq!(first, WebhookResult::Processed);
        assert_eq!(second, WebhookResult::AlreadyProcessed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let counting = Arc::new(CountingHandler::new());
        let h = handler(counting.clone());
        let payload = serde_json::json!({
            "id": "evt_unknown",
            "type": "customer.created",
            "created": chrono::Utc::now().timestamp(),
            "data": {"object": {}},
            "livemode": false
        })
        .to_string();

        let result = h.handle(signed_command(&payload)).await;

        assert_eq!(result.unwrap(), WebhookResult::Processed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }
}
