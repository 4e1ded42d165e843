//! CheckoutCompletedHandler - reconciles `checkout.session.completed`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::billing::{
    AudienceSpace, CheckoutSessionObject, Purchase, StripeEvent, StripeEventType, WebhookError,
    WebhookEventHandler,
};
use crate::domain::foundation::{ProductId, UserId};
use crate::ports::{
    InsertOutcome, PendingCheckoutRepository, ProductRepository, PurchaseRepository,
    UserRepository,
};

/// Business context recovered for a completed session.
struct SessionContext {
    user_id: UserId,
    product_id: Option<ProductId>,
    space: Option<AudienceSpace>,
}

/// Handler for completed checkout sessions.
///
/// One-time purchases become Purchase facts; subscription checkouts only
/// persist the customer linkage (the subscription facts arrive via the
/// lifecycle events). Idempotent under redelivery: the purchase insert is
/// insert-or-ignore on `(user_id, product_id, provider_ref)` and the
/// customer linkage is an overwrite of the same value.
pub struct CheckoutCompletedHandler {
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    pending: Arc<dyn PendingCheckoutRepository>,
}

impl CheckoutCompletedHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        purchases: Arc<dyn PurchaseRepository>,
        pending: Arc<dyn PendingCheckoutRepository>,
    ) -> Self {
        Self {
            users,
            products,
            purchases,
            pending,
        }
    }

    /// Recovers `{user_id, product_id, space}` from session metadata,
    /// falling back to the pending-checkout record when the provider
    /// dropped or truncated the metadata.
    async fn resolve_context(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<Option<SessionContext>, WebhookError> {
        let meta_user: Option<UserId> = session
            .metadata
            .get("user_id")
            .and_then(|s| s.parse().ok());
        let meta_product: Option<ProductId> = session
            .metadata
            .get("product_id")
            .and_then(|s| s.parse().ok());
        let meta_space = session
            .metadata
            .get("space")
            .and_then(|s| AudienceSpace::parse(s));

        // Consult the record written at session creation time whenever
        // the returned metadata is incomplete.
        let pending = if meta_user.is_none() || meta_product.is_none() {
            self.pending.find_by_session_id(&session.id).await?
        } else {
            None
        };

        let Some(user_id) = meta_user.or(pending.as_ref().map(|p| p.user_id)) else {
            return Ok(None);
        };

        Ok(Some(SessionContext {
            user_id,
            product_id: meta_product.or(pending.as_ref().map(|p| p.product_id)),
            space: meta_space.or(pending.as_ref().map(|p| p.space)),
        }))
    }

    async fn record_purchase(
        &self,
        session: &CheckoutSessionObject,
        context: &SessionContext,
    ) -> Result<(), WebhookError> {
        let Some(product_id) = context.product_id else {
            tracing::warn!(
                session_id = %session.id,
                "Completed one-time checkout carries no product id; nothing to reconcile"
            );
            return Err(WebhookError::Ignored(
                "one-time checkout without product_id metadata".to_string(),
            ));
        };

        let Some(provider_ref) = session.payment_intent.clone() else {
            tracing::warn!(
                session_id = %session.id,
                "Completed one-time checkout carries no payment intent"
            );
            return Err(WebhookError::Ignored(
                "one-time checkout without payment_intent".to_string(),
            ));
        };

        // The space tag normally rides in metadata; fall back to the
        // product's own space.
        let space = match context.space {
            Some(space) => space,
            None => match self.products.find_by_id(&product_id).await? {
                Some(product) => product.space,
                None => {
                    tracing::error!(
                        session_id = %session.id,
                        product_id = %product_id,
                        "Completed checkout references unknown product"
                    );
                    return Err(WebhookError::Ignored(format!(
                        "unknown product {}",
                        product_id
                    )));
                }
            },
        };

        let purchase = Purchase::paid(context.user_id, product_id, provider_ref, space);

        match self.purchases.insert_if_absent(&purchase).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    user_id = %context.user_id,
                    product_id = %product_id,
                    provider_ref = %purchase.provider_ref,
                    "Purchase recorded"
                );
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(
                    user_id = %context.user_id,
                    product_id = %product_id,
                    "Purchase already recorded; redelivered event ignored"
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn handles(&self) -> Vec<StripeEventType> {
        vec![StripeEventType::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), WebhookError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(format!("invalid checkout session: {}", e)))?;

        let Some(context) = self.resolve_context(&session).await? else {
            tracing::warn!(
                session_id = %session.id,
                "Completed checkout cannot be attributed to a user"
            );
            return Err(WebhookError::Ignored(
                "checkout session without user context".to_string(),
            ));
        };

        // Persist the customer linkage whenever the session carries one.
        // Safe to repeat across redeliveries.
        if let Some(customer_id) = &session.customer {
            self.users
                .link_customer(&context.user_id, customer_id)
                .await?;
        }

        if session.is_one_time() {
            self.record_purchase(&session, &context).await?;
        } else {
            // Subscription checkout: the subscription facts arrive via
            // customer.subscription.* events; the linkage above is all
            // this event contributes.
            tracing::debug!(
                session_id = %session.id,
                user_id = %context.user_id,
                "Subscription checkout completed; awaiting lifecycle events"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{
        Product, ProductKind, PurchaseStatus, StripeEventBuilder, SubscriptionStatus, UserAccount,
    };
    use crate::domain::foundation::{DomainError, Timestamp};
    use crate::ports::PendingCheckout;
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

        fn customer_id_of(&self, user_id: &UserId) -> Option<String> {
            self.accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| &a.id == user_id)
                .and_then(|a| a.customer_id.clone())
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
            user_id: &UserId,
            customer_id: &str,
        ) -> Result<(), DomainError> {
            let mut accounts = self.accounts.lock().unwrap();
            if let Some(a) = accounts.iter_mut().find(|a| &a.id == user_id) {
                a.customer_id = Some(customer_id.to_string());
            }
            Ok(())
        }

        async fn set_subscription_status(
            &self,
            _user_id: &UserId,
            _status: SubscriptionStatus,
        ) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct MockProductRepository {
        products: Vec<Product>,
    }

    #[async_trait]
    impl ProductRepository for MockProductRepository {
        async fn find_by_id(
            &self,
            product_id: &ProductId,
        ) -> Result<Option<Product>, DomainError> {
            Ok(self.products.iter().find(|p| &p.id == product_id).cloned())
        }
    }

    struct MockPurchaseRepository {
        purchases: Mutex<Vec<Purchase>>,
    }

    impl MockPurchaseRepository {
        fn new() -> Self {
            Self {
                purchases: Mutex::new(Vec::new()),
            }
        }

        fn all(&self) -> Vec<Purchase> {
            self.purchases.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PurchaseRepository for MockPurchaseRepository {
        async fn insert_if_absent(
            &self,
            purchase: &Purchase,
        ) -> Result<InsertOutcome, DomainError> {
            let mut purchases = self.purchases.lock().unwrap();
            let exists = purchases.iter().any(|p| {
                p.user_id == purchase.user_id
                    && p.product_id == purchase.product_id
                    && p.provider_ref == purchase.provider_ref
            });
            if exists {
                Ok(InsertOutcome::Duplicate)
            } else {
                purchases.push(purchase.clone());
                Ok(InsertOutcome::Inserted)
            }
        }

        async fn find_effective(
            &self,
            user_id: &UserId,
            product_id: &ProductId,
        ) -> Result<Option<Purchase>, DomainError> {
            Ok(self
                .purchases
                .lock()
                .unwrap()
                .iter()
                .find(|p| {
                    &p.user_id == user_id
                        && &p.product_id == product_id
                        && p.status == PurchaseStatus::Paid
                })
                .cloned())
        }

        async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
            Ok(self
                .purchases
                .lock()
                .unwrap()
                .iter()
                .filter(|p| &p.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn set_status_by_provider_ref(
            &self,
            provider_ref: &str,
            status: PurchaseStatus,
        ) -> Result<u64, DomainError> {
            let mut purchases = self.purchases.lock().unwrap();
            let mut changed = 0;
            for p in purchases.iter_mut().filter(|p| p.provider_ref == provider_ref) {
                if p.status != status {
                    p.status = status;
                    changed += 1;
                }
            }
            Ok(changed)
        }
    }

    struct MockPendingCheckoutRepository {
        records: Mutex<Vec<PendingCheckout>>,
    }

    impl MockPendingCheckoutRepository {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
            }
        }

        fn with_record(record: PendingCheckout) -> Self {
            Self {
                records: Mutex::new(vec![record]),
            }
        }
    }

    #[async_trait]
    impl PendingCheckoutRepository for MockPendingCheckoutRepository {
        async fn save(&self, pending: &PendingCheckout) -> Result<(), DomainError> {
            self.records.lock().unwrap().push(pending.clone());
            Ok(())
        }

        async fn find_by_session_id(
            &self,
            session_id: &str,
        ) -> Result<Option<PendingCheckout>, DomainError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.session_id == session_id)
                .cloned())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn account() -> UserAccount {
        UserAccount {
            id: UserId::new(),
            email: "buyer@example.com".to_string(),
            customer_id: None,
            subscription_status: None,
            is_admin: false,
            disabled_at: None,
            created_at: Timestamp::now(),
        }
    }

    fn pack_product() -> Product {
        Product {
            id: ProductId::new(),
            space: AudienceSpace::Adults,
            kind: ProductKind::Pack,
            price_ref: "price_pack_4900".to_string(),
            active: true,
            unit_amount: 4900,
            created_at: Timestamp::now(),
        }
    }

    struct Fixture {
        users: Arc<MockUserRepository>,
        purchases: Arc<MockPurchaseRepository>,
        handler: CheckoutCompletedHandler,
    }

    fn fixture(
        account: UserAccount,
        products: Vec<Product>,
        pending: MockPendingCheckoutRepository,
    ) -> Fixture {
        let users = Arc::new(MockUserRepository::with_account(account));
        let purchases = Arc::new(MockPurchaseRepository::new());
        let handler = CheckoutCompletedHandler::new(
            users.clone(),
            Arc::new(MockProductRepository { products }),
            purchases.clone(),
            Arc::new(pending),
        );
        Fixture {
            users,
            purchases,
            handler,
        }
    }

    fn completed_event(object: serde_json::Value) -> StripeEvent {
        StripeEventBuilder::new()
            .id("evt_checkout_1")
            .event_type("checkout.session.completed")
            .object(object)
            .build()
    }

    fn one_time_session(user: &UserAccount, product: &Product) -> serde_json::Value {
        json!({
            "id": "cs_1",
            "mode": "payment",
            "customer": "cus_1",
            "payment_intent": "pi_123",
            "subscription": null,
            "metadata": {
                "user_id": user.id.to_string(),
                "product_id": product.id.to_string(),
                "space": product.space.as_str()
            }
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // One-Time Purchase Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn records_purchase_for_one_time_checkout() {
        let account = account();
        let product = pack_product();
        let event = completed_event(one_time_session(&account, &product));
        let f = fixture(
            account.clone(),
            vec![product.clone()],
            MockPendingCheckoutRepository::new(),
        );

        f.handler.handle(&event).await.unwrap();

        let purchases = f.purchases.all();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].user_id, account.id);
        assert_eq!(purchases[0].product_id, product.id);
        assert_eq!(purchases[0].status, PurchaseStatus::Paid);
        assert_eq!(purchases[0].provider_ref, "pi_123");
        assert_eq!(purchases[0].space, AudienceSpace::Adults);
    }

    #[tokio::test]
    async fn redelivered_event_does_not_create_second_purchase() {
        let account = account();
        let product = pack_product();
        let event = completed_event(one_time_session(&account, &product));
        let f = fixture(
            account,
            vec![product],
            MockPendingCheckoutRepository::new(),
        );

        f.handler.handle(&event).await.unwrap();
        f.handler.handle(&event).await.unwrap();

        assert_eq!(f.purchases.all().len(), 1);
    }

    #[tokio::test]
    async fn persists_customer_linkage() {
        let account = account();
        let user_id = account.id;
        let product = pack_product();
        let event = completed_event(one_time_session(&account, &product));
        let f = fixture(
            account,
            vec![product],
            MockPendingCheckoutRepository::new(),
        );

        f.handler.handle(&event).await.unwrap();

        assert_eq!(f.users.customer_id_of(&user_id).as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn missing_product_id_is_logged_noop() {
        let account = account();
        let event = completed_event(json!({
            "id": "cs_no_product",
            "mode": "payment",
            "customer": "cus_1",
            "payment_intent": "pi_123",
            "subscription": null,
            "metadata": { "user_id": account.id.to_string() }
        }));
        let f = fixture(account, vec![], MockPendingCheckoutRepository::new());

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(f.purchases.all().is_empty());
    }

    #[tokio::test]
    async fn unattributable_session_is_ignored() {
        let account = account();
        let event = completed_event(json!({
            "id": "cs_anonymous",
            "mode": "payment",
            "customer": "cus_1",
            "payment_intent": "pi_123",
            "subscription": null,
            "metadata": {}
        }));
        let f = fixture(account, vec![], MockPendingCheckoutRepository::new());

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::Ignored(_))));
        assert!(f.purchases.all().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_pending_checkout_when_metadata_dropped() {
        let account = account();
        let product = pack_product();
        let pending = MockPendingCheckoutRepository::with_record(PendingCheckout {
            session_id: "cs_1".to_string(),
            user_id: account.id,
            product_id: product.id,
            space: product.space,
            is_subscription: false,
            created_at: Timestamp::now(),
        });
        // Provider returned the session with its metadata stripped.
        let event = completed_event(json!({
            "id": "cs_1",
            "mode": "payment",
            "customer": "cus_1",
            "payment_intent": "pi_123",
            "subscription": null,
            "metadata": {}
        }));
        let f = fixture(account.clone(), vec![product.clone()], pending);

        f.handler.handle(&event).await.unwrap();

        let purchases = f.purchases.all();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].user_id, account.id);
        assert_eq!(purchases[0].product_id, product.id);
    }

    #[tokio::test]
    async fn resolves_space_from_product_when_metadata_lacks_it() {
        let account = account();
        let product = pack_product();
        let event = completed_event(json!({
            "id": "cs_1",
            "mode": "payment",
            "customer": "cus_1",
            "payment_intent": "pi_123",
            "subscription": null,
            "metadata": {
                "user_id": account.id.to_string(),
                "product_id": product.id.to_string()
            }
        }));
        let f = fixture(
            account,
            vec![product.clone()],
            MockPendingCheckoutRepository::new(),
        );

        f.handler.handle(&event).await.unwrap();

        assert_eq!(f.purchases.all()[0].space, product.space);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscription Checkout Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn subscription_checkout_links_customer_without_purchase() {
        let account = account();
        let user_id = account.id;
        let event = completed_event(json!({
            "id": "cs_sub",
            "mode": "subscription",
            "customer": "cus_1",
            "payment_intent": null,
            "subscription": "sub_1",
            "metadata": { "user_id": user_id.to_string(), "space": "kids" }
        }));
        let f = fixture(account, vec![], MockPendingCheckoutRepository::new());

        f.handler.handle(&event).await.unwrap();

        assert!(f.purchases.all().is_empty());
        assert_eq!(f.users.customer_id_of(&user_id).as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn malformed_session_object_is_parse_error() {
        let account = account();
        let event = completed_event(json!({"id": "cs_bad"}));
        let f = fixture(account, vec![], MockPendingCheckoutRepository::new());

        let result = f.handler.handle(&event).await;

        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }
}
