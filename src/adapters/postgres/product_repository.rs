//! PostgreSQL implementation of ProductRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{AudienceSpace, Product, ProductKind};
use crate::domain::foundation::{DomainError, ErrorCode, ProductId, Timestamp};
use crate::ports::ProductRepository;

/// PostgreSQL implementation of the ProductRepository port.
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a product.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    space: String,
    kind: String,
    price_ref: String,
    active: bool,
    unit_amount: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DomainError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let space = AudienceSpace::parse(&row.space).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid space value: {}", row.space),
            )
        })?;
        let kind = ProductKind::parse(&row.kind).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid kind value: {}", row.kind),
            )
        })?;

        Ok(Product {
            id: ProductId::from_uuid(row.id),
            space,
            kind,
            price_ref: row.price_ref,
            active: row.active,
            unit_amount: row.unit_amount,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn find_by_id(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, space, kind, price_ref, active, unit_amount, created_at
             FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load product: {}", e),
            )
        })?;

        row.map(Product::try_from).transpose()
    }
}
