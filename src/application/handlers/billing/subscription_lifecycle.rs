//! SubscriptionLifecycleHandler - reconciles `customer.subscription.*`.
//!
//! Created, updated and deleted share one code path: each event carries
//! the full current state of the subscription, so reconciliation is a
//! single timestamp-guarded upsert. Deletion is just another status value
//! ("canceled"); the row persists with terminal status.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::billing::{
    AudienceSpace, StripeEvent, StripeEventType, SubscriptionObject, SubscriptionRecord,
    SubscriptionStatus, WebhookError, WebhookEventHandler,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{SubscriptionRepository, UpsertOutcome, UserRepository};

/// Handler for subscription lifecycle events.
pub struct SubscriptionLifecycleHandler {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionLifecycleHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            users,
            subscriptions,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionLifecycleHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![
            StripeEventType::CustomerSubscriptionCreated,
            StripeEventType::CustomerSubscriptionUpdated,
            StripeEventType::CustomerSubscriptionDeleted,
        ]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(format!("invalid subscription: {}", e)))?;

        // 1. Resolve the local user via the provider customer id. A
        //    missing link is permanent, not transient: acknowledge and
        //    drop rather than asking for redelivery.
        let Some(account) = self
            .users
            .find_by_customer_id(&subscription.customer)
            .await?
        else {
            tracing::error!(
                subscription_id = %subscription.id,
                customer_id = %subscription.customer,
                "Subscription event references a customer with no local user"
            );
            return Err(WebhookError::Ignored(format!(
                "no user for customer {}",
                subscription.customer
            )));
        };

        // 2. Build the canonical record from the event payload.
        let Some(space) = subscription
            .metadata
            .get("space")
            .and_then(|s| AudienceSpace::parse(s))
        else {
            tracing::error!(
                subscription_id = %subscription.id,
                "Subscription carries no audience space tag; cannot scope entitlement"
            );
            return Err(WebhookError::Ignored(format!(
                "subscription {} without space metadata",
                subscription.id
            )));
        };

        let Some(price_ref) = subscription.price_ref().map(String::from) else {
            tracing::error!(
                subscription_id = %subscription.id,
                "Subscription carries no line items"
            );
            return Err(WebhookError::Ignored(format!(
                "subscription {} without line items",
                subscription.id
            )));
        };

        let status = SubscriptionStatus::parse(&subscription.status);
        let record = SubscriptionRecord {
            id: subscription.id.clone(),
            user_id: account.id,
            status,
            price_ref,
            quantity: subscription.quantity(),
            cancel_at_period_end: subscription.cancel_at_period_end,
            current_period_start: Timestamp::from_unix_secs(subscription.current_period_start),
            current_period_end: Timestamp::from_unix_secs(subscription.current_period_end),
            space,
            metadata: subscription.metadata.clone(),
            event_ts: Timestamp::from_unix_secs(event.created),
        };

        // 3. Timestamp-guarded upsert keyed by the provider id. A stale
        //    event losing the compare-and-set must not touch the mirror
        //    either.
        match self.subscriptions.upsert(&record).await? {
            UpsertOutcome::Applied => {
                // 4. Recompute the denormalized mirror from the row that
                //    was just applied.
                self.users
                    .set_subscription_status(&account.id, status)
                    .await?;

                tracing::info!(
                    subscription_id = %record.id,
                    user_id = %account.id,
                    status = %status,
                    space = %space,
                    "Subscription reconciled"
                );
            }
            UpsertOutcome::Stale => {
                tracing::warn!(
                    subscription_id = %record.id,
                    event_id = %event.id,
                    event_ts = event.created,
                    "Out-of-order subscription event ignored; stored state is newer"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{StripeEventBuilder, UserAccount};
    use crate::domain::foundation::{DomainError, UserId};
    use serde_json::json;
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockUserRepository {
        accounts: Mutex<Vec<UserAccount>>,
    }

    impl MockUserRepository {
        fn with_account(account: UserAccount) -> Self {
            Self {
                accounts: Mutex::new(vec![account]),
            }
        }

        fn status_of(&self, user_id: &UserId) -> Option<SubscriptionStatus> {
            self.accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| &a.id == user_id)
                .and_then(|a| a.subscription_status)
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_id(
            &self,
            user_id: &UserId,
        ) -> Result<Option<UserAccount>, DomainError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| &a.id == user_id)
                .cloned())
        }

        async fn find_by_customer_id(
            &self,
            customer_id: &str,
        ) -> Result<Option<UserAccount>, DomainError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.customer_id.as_deref() == Some(customer_id))
                .cloned())
        }

        async fn link_customer(
            &self,
            _user_id: &UserId,
            _customer_id: &str,
        ) -> Result<(), DomainError> {
            Ok(())
        }

        async fn set_subscription_status(
            &self,
            user_id: &UserId,
            status: SubscriptionStatus,
        ) -> Result<(), DomainError> {
            let mut accounts = self.accounts.lock().unwrap();
            if let Some(a) = accounts.iter_mut().find(|a| &a.id == user_id) {
                a.subscription_status = Some(status);
            }
            Ok(())
        }
    }

    /// In-memory store with the same timestamp guard the Postgres adapter
    /// enforces.
    struct MockSubscriptionRepository {
        records: Mutex<Vec<SubscriptionRecord>>,
    }

    impl MockSubscriptionRepository {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
            }
        }

        fn all(&self) -> Vec<SubscriptionRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubscriptionRepository for MockSubscriptionRepository {
        async fn upsert(
            &self,
            record: &SubscriptionRecord,
        ) -> Result<UpsertOutcome, DomainError> {
            let mut records = self.records.lock().unwrap();
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => {
                    if existing.event_ts.is_after(&record.event_ts) {
                        Ok(UpsertOutcome::Stale)
                    } else {
                        *existing = record.clone();
                        Ok(UpsertOutcome::Applied)
                    }
                }
                None => {
                    records.push(record.clone());
                    Ok(UpsertOutcome::Applied)
                }
            }
        }

        async fn find_by_id(
            &self,
            subscription_id: &str,
        ) -> Result<Option<SubscriptionRecord>, DomainError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == subscription_id)
                .cloned())
        }

        async fn list_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<SubscriptionRecord>, DomainError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn list_for_user_in_space(
            &self,
            user_id: &UserId,
            space: AudienceSpace,
        ) -> Result<Vec<SubscriptionRecord>, DomainError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.user_id == user_id && r.space == space)
                .cloned()
                .collect())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn linked_account() -> UserAccount {
        UserAccount {
            id: UserId::new(),
            email: "subscriber@example.com".to_string(),
            customer_id: Some("cus_1".to_string()),
            subscription_status: None,
            is_admin: false,
            disabled_at: None,
            created_at: Timestamp::now(),
        }
    }

    struct Fixture {
        users: Arc<MockUserRepository>,
        subscriptions: Arc<MockSubscriptionRepository>,
        handler: SubscriptionLifecycleHandler,
    }

    fn fixture(account: UserAccount) -> Fixture {
        let users = Arc::new(MockUserRepository::with_account(account));
        let subscriptions = Arc::new(MockSubscriptionRepository::new());
        let handler = SubscriptionLifecycleHandler::new(users.clone(), subscriptions.clone());
        Fixture {
            users,
            subscriptions,
            handler,
        }
    }

    fn subscription_object(status: &str, space: &str) -> serde_json::Value {
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": status,
            "cancel_at_period_end": false,
            "current_period_start": 1704067200,
            "current_period_end": 1706745600,
            "metadata": {"space": space},
            "items": {
                "data": [
                    {"price": {"id": "price_club_kids"}, "quantity": 1}
                ]
            }
        })
    }

    fn lifecycle_event(
        event_id: &str,
        event_type: &str,
        created: i64,
        object: serde_json::Value,
    ) -> StripeEvent {
        StripeEventBuilder::new()
            .id(event_id)
            .event_type(event_type)
            .created(created)
            .object(object)
            .build()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn created_event_inserts_record_and_mirrors_status() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);
        let event = lifecycle_event(
            "evt_1",
            "customer.subscription.created",
            1_704_067_200,
            subscription_object("active", "kids"),
        );

        f.handler.handle(&event).await.unwrap();

        let records = f.subscriptions.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "sub_1");
        assert_eq!(records[0].user_id, user_id);
        assert_eq!(records[0].status, SubscriptionStatus::Active);
        assert_eq!(records[0].space, AudienceSpace::Kids);
        assert_eq!(records[0].price_ref, "price_club_kids");
        assert_eq!(
            f.users.status_of(&user_id),
            Some(SubscriptionStatus::Active)
        );
    }

    #[tokio::test]
    async fn updated_event_overwrites_with_latest_state() {
        let account = linked_account();
        let f = fixture(account);

        let created = lifecycle_event(
            "evt_1",
            "customer.subscription.created",
            1_704_067_200,
            subscription_object("active", "kids"),
        );
        let updated = lifecycle_event(
            "evt_2",
            "customer.subscription.updated",
            1_704_070_000,
            subscription_object("past_due", "kids"),
        );

        f.handler.handle(&created).await.unwrap();
        f.handler.handle(&updated).await.unwrap();

        let records = f.subscriptions.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn redelivered_identical_payload_converges() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);
        let event = lifecycle_event(
            "evt_1",
            "customer.subscription.updated",
            1_704_070_000,
            subscription_object("active", "kids"),
        );

        f.handler.handle(&event).await.unwrap();
        let after_first = f.subscriptions.all();
        f.handler.handle(&event).await.unwrap();
        let after_second = f.subscriptions.all();

        assert_eq!(after_first, after_second);
        assert_eq!(
            f.users.status_of(&user_id),
            Some(SubscriptionStatus::Active)
        );
    }

    #[tokio::test]
    async fn stale_event_does_not_roll_back_newer_state() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);

        // The "updated" event (t=2) lands before the "created" event (t=1).
        let updated = lifecycle_event(
            "evt_2",
            "customer.subscription.updated",
            1_704_070_000,
            subscription_object("canceled", "kids"),
        );
        let created = lifecycle_event(
            "evt_1",
            "customer.subscription.created",
            1_704_067_200,
            subscription_object("active", "kids"),
        );

        f.handler.handle(&updated).await.unwrap();
        f.handler.handle(&created).await.unwrap();

        let records = f.subscriptions.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SubscriptionStatus::Canceled);
        // The mirror must reflect the newer event too.
        assert_eq!(
            f.users.status_of(&user_id),
            Some(SubscriptionStatus::Canceled)
        );
    }

    #[tokio::test]
    async fn deleted_event_is_just_a_status_write() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);

        let created = lifecycle_event(
            "evt_1",
            "customer.subscription.created",
            1_704_067_200,
            subscription_object("active", "kids"),
        );
        let deleted = lifecycle_event(
            "evt_2",
            "customer.subscription.deleted",
            1_704_080_000,
            subscription_object("canceled", "kids"),
        );

        f.handler.handle(&created).await.unwrap();
        f.handler.handle(&deleted).await.unwrap();

        // The row persists with terminal status; no hard delete.
        let records = f.subscriptions.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SubscriptionStatus::Canceled);
        assert_eq!(
            f.users.status_of(&user_id),
            Some(SubscriptionStatus::Canceled)
        );
    }

    #[tokio::test]
    async fn unresolvable_customer_is_acknowledged_and_dropped() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);
        let object = json!({
            "id": "sub_orphan",
            "customer": "cus_nobody",
            "status": "active",
            "current_period_start": 1704067200,
            "current_period_end": 1706745600,
            "metadata": {"space": "kids"},
            "items": {"data": [{"price": {"id": "price_x"}, "quantity": 1}]}
        });
        let event = lifecycle_event("evt_1", "customer.subscription.created", 1_704_067_200, object);

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(f.subscriptions.all().is_empty());
        assert_eq!(f.users.status_of(&user_id), None);
    }

    #[tokio::test]
    async fn missing_space_metadata_is_acknowledged_and_dropped() {
        let account = linked_account();
        let f = fixture(account);
        let object = json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_start": 1704067200,
            "current_period_end": 1706745600,
            "metadata": {},
            "items": {"data": [{"price": {"id": "price_x"}, "quantity": 1}]}
        });
        let event = lifecycle_event("evt_1", "customer.subscription.created", 1_704_067_200, object);

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(f.subscriptions.all().is_empty());
    }

    #[tokio::test]
    async fn unknown_status_string_is_stored_as_unknown() {
        let account = linked_account();
        let user_id = account.id;
        let f = fixture(account);
        let event = lifecycle_event(
            "evt_1",
            "customer.subscription.updated",
            1_704_070_000,
            subscription_object("brand_new_status", "adults"),
        );

        f.handler.handle(&event).await.unwrap();

        let records = f.subscriptions.all();
        assert_eq!(records[0].status, SubscriptionStatus::Unknown);
        assert!(!records[0].is_entitling());
        assert_eq!(
            f.users.status_of(&user_id),
            Some(SubscriptionStatus::Unknown)
        );
    }

    #[tokio::test]
    async fn malformed_subscription_object_is_parse_error() {
        let account = linked_account();
        let f = fixture(account);
        let event = lifecycle_event(
            "evt_1",
            "customer.subscription.created",
            1_704_067_200,
            json!({"id": "sub_1"}),
        );

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }
}
