//! ProductRepository port - read access to the product catalog.

use async_trait::async_trait;

use crate::domain::billing::Product;
use crate::domain::foundation::{DomainError, ProductId};

/// Port for reading products.
///
/// Catalog management (create/edit) is an operator concern handled by the
/// admin surface; reconciliation only reads.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Find a product by its id.
    async fn find_by_id(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError>;
}
