//! CheckEntitlementHandler - Query handler for "is product P unlocked
//! for user U".

use std::sync::Arc;

use crate::domain::billing::{is_unlocked, BillingError, EntitlementFacts};
use crate::domain::foundation::{ProductId, UserId};
use crate::ports::{
    ProductRepository, PurchaseRepository, SubscriptionRepository, UserRepository,
};

/// Query for one (user, product) entitlement.
#[derive(Debug, Clone)]
pub struct CheckEntitlementQuery {
    pub user_id: UserId,
    pub product_id: ProductId,
}

/// Result of an entitlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementAnswer {
    pub unlocked: bool,
}

/// Read-only handler combining the stored facts through the domain policy.
pub struct CheckEntitlementHandler {
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl CheckEntitlementHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        purchases: Arc<dyn PurchaseRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            users,
            products,
            purchases,
            subscriptions,
        }
    }

    pub async fn handle(
        &self,
        query: CheckEntitlementQuery,
    ) -> Result<EntitlementAnswer, BillingError> {
        let account = self
            .users
            .find_by_id(&query.user_id)
            .await?
            .ok_or(BillingError::UserNotFound(query.user_id))?;

        let product = self
            .products
            .find_by_id(&query.product_id)
            .await?
            .ok_or(BillingError::ProductNotFound(query.product_id))?;

        let purchase = self
            .purchases
            .find_effective(&query.user_id, &query.product_id)
            .await?;

        // Only the product's own space can unlock it, so the narrower
        // query suffices.
        let subscriptions = self
            .subscriptions
            .list_for_user_in_space(&query.user_id, product.space)
            .await?;

        let unlocked = is_unlocked(&EntitlementFacts {
            account: &account,
            product: &product,
            purchase: purchase.as_ref(),
            subscriptions: &subscriptions,
        });

        Ok(EntitlementAnswer { unlocked })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::billing::{
        AudienceSpace, Product, ProductKind, Purchase, PurchaseStatus, SubscriptionRecord,
        SubscriptionStatus, UserAccount,
    };
    use crate::domain::foundation::{DomainError, Timestamp};
    use async_trait::async_trait;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockUserRepository {
        account: Option<UserAccount>,
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_id(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<UserAccount>, DomainError> {
            Ok(self.account.clone())
        }

        async fn find_by_customer_id(
            &self,
            _customer_id: &str,
        ) -> Result<Option<UserAccount>, DomainError> {
            Ok(self.account.clone())
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

    #[async_trait]
    impl PurchaseRepository for MockPurchaseRepository {
        async fn insert_if_absent(
            &self,
            purchase: &Purchase,
        ) -> Result<crate::ports::InsertOutcome, DomainError> {
            self.purchases.lock().unwrap().push(purchase.clone());
            Ok(crate::ports::InsertOutcome::Inserted)
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
            _provider_ref: &str,
            _status: PurchaseStatus,
        ) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    struct MockSubscriptionRepository {
        records: Vec<SubscriptionRecord>,
    }

    #[async_trait]
    impl SubscriptionRepository for MockSubscriptionRepository {
        async fn upsert(
            &self,
            _record: &SubscriptionRecord,
        ) -> Result<crate::ports::UpsertOutcome, DomainError> {
            Ok(crate::ports::UpsertOutcome::Applied)
        }

        async fn find_by_id(
            &self,
            subscription_id: &str,
        ) -> Result<Option<SubscriptionRecord>, DomainError> {
            Ok(self
                .records
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
                .iter()
                .filter(|r| &r.user_id == user_id && r.space == space)
                .cloned()
                .collect())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn account() -> UserAccount {
        UserAccount {
            id: UserId::new(),
            email: "member@example.com".to_string(),
            customer_id: Some("cus_1".to_string()),
            subscription_status: None,
            is_admin: false,
            disabled_at: None,
            created_at: Timestamp::now(),
        }
    }

    fn product(space: AudienceSpace, unit_amount: i64) -> Product {
        Product {
            id: ProductId::new(),
            space,
            kind: ProductKind::Pack,
            price_ref: "price_pack".to_string(),
            active: true,
            unit_amount,
            created_at: Timestamp::now(),
        }
    }

    fn subscription(
        user_id: UserId,
        space: AudienceSpace,
        status: SubscriptionStatus,
    ) -> SubscriptionRecord {
        SubscriptionRecord {
            id: "sub_1".to_string(),
            user_id,
            status,
            price_ref: "price_club".to_string(),
            quantity: 1,
            cancel_at_period_end: false,
            current_period_start: Timestamp::from_unix_secs(1_704_067_200),
            current_period_end: Timestamp::from_unix_secs(1_706_745_600),
            space,
            metadata: HashMap::new(),
            event_ts: Timestamp::from_unix_secs(1_704_067_200),
        }
    }

    fn handler(
        account: Option<UserAccount>,
        products: Vec<Product>,
        purchases: Vec<Purchase>,
        subscriptions: Vec<SubscriptionRecord>,
    ) -> CheckEntitlementHandler {
        CheckEntitlementHandler::new(
            Arc::new(MockUserRepository { account }),
            Arc::new(MockProductRepository { products }),
            Arc::new(MockPurchaseRepository {
                purchases: Mutex::new(purchases),
            }),
            Arc::new(MockSubscriptionRepository {
                records: subscriptions,
            }),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn purchase_unlocks_product() {
        let account = account();
        let product = product(AudienceSpace::Adults, 4900);
        let purchase = Purchase::paid(account.id, product.id, "pi_1", product.space);
        let query = CheckEntitlementQuery {
            user_id: account.id,
            product_id: product.id,
        };
        let h = handler(Some(account), vec![product], vec![purchase], vec![]);

        let answer = h.handle(query).await.unwrap();

        assert!(answer.unlocked);
    }

    #[tokio::test]
    async fn no_facts_means_locked() {
        let account = account();
        let product = product(AudienceSpace::Adults, 4900);
        let query = CheckEntitlementQuery {
            user_id: account.id,
            product_id: product.id,
        };
        let h = handler(Some(account), vec![product], vec![], vec![]);

        let answer = h.handle(query).await.unwrap();

        assert!(!answer.unlocked);
    }

    #[tokio::test]
    async fn subscription_in_matching_space_unlocks() {
        let account = account();
        let product = product(AudienceSpace::Kids, 4900);
        let sub = subscription(account.id, AudienceSpace::Kids, SubscriptionStatus::Active);
        let query = CheckEntitlementQuery {
            user_id: account.id,
            product_id: product.id,
        };
        let h = handler(Some(account), vec![product], vec![], vec![sub]);

        let answer = h.handle(query).await.unwrap();

        assert!(answer.unlocked);
    }

    #[tokio::test]
    async fn subscription_in_other_space_does_not_unlock() {
        let account = account();
        let product = product(AudienceSpace::Kids, 4900);
        let sub = subscription(account.id, AudienceSpace::Adults, SubscriptionStatus::Active);
        let query = CheckEntitlementQuery {
            user_id: account.id,
            product_id: product.id,
        };
        let h = handler(Some(account), vec![product], vec![], vec![sub]);

        let answer = h.handle(query).await.unwrap();

        assert!(!answer.unlocked);
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let product = product(AudienceSpace::Adults, 4900);
        let query = CheckEntitlementQuery {
            user_id: UserId::new(),
            product_id: product.id,
        };
        let h = handler(None, vec![product], vec![], vec![]);

        let result = h.handle(query).await;

        assert!(matches!(result, Err(BillingError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_product_is_an_error() {
        let account = account();
        let query = CheckEntitlementQuery {
            user_id: account.id,
            product_id: ProductId::new(),
        };
        let h = handler(Some(account), vec![], vec![], vec![]);

        let result = h.handle(query).await;

        assert!(matches!(result, Err(BillingError::ProductNotFound(_))));
    }
}
