//! ListPurchasesHandler - a user's own purchase facts.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Purchase};
use crate::domain::foundation::UserId;
use crate::ports::PurchaseRepository;

/// Query for a user's purchase history.
#[derive(Debug, Clone)]
pub struct ListPurchasesQuery {
    pub user_id: UserId,
}

/// Read-only handler over the purchase store.
pub struct ListPurchasesHandler {
    purchases: Arc<dyn PurchaseRepository>,
}

impl ListPurchasesHandler {
    pub fn new(purchases: Arc<dyn PurchaseRepository>) -> Self {
        Self { purchases }
    }

    pub async fn handle(&self, query: ListPurchasesQuery) -> Result<Vec<Purchase>, BillingError> {
        Ok(self.purchases.list_for_user(&query.user_id).await?)
    }
}
