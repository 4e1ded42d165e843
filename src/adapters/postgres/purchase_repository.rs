//! PostgreSQL implementation of PurchaseRepository.
//!
//! The `purchases_user_product_ref_key` unique index is what makes
//! redelivered checkout events harmless: inserts are `ON CONFLICT DO
//! NOTHING` and the caller observes `Duplicate` instead of an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{AudienceSpace, Purchase, PurchaseStatus};
use crate::domain::foundation::{DomainError, ErrorCode, ProductId, PurchaseId, Timestamp, UserId};
use crate::ports::{InsertOutcome, PurchaseRepository};

/// PostgreSQL implementation of the PurchaseRepository port.
pub struct PostgresPurchaseRepository {
    pool: PgPool,
}

impl PostgresPurchaseRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a purchase.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    status: String,
    provider_ref: String,
    space: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let status = PurchaseStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid purchase status: {}", row.status),
            )
        })?;
        let space = AudienceSpace::parse(&row.space).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid space value: {}", row.space),
            )
        })?;

        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            product_id: ProductId::from_uuid(row.product_id),
            status,
            provider_ref: row.provider_ref,
            space,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, product_id, status, provider_ref, space, created_at";

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn insert_if_absent(&self, purchase: &Purchase) -> Result<InsertOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO purchases (
                id, user_id, product_id, status, provider_ref, space, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT purchases_user_product_ref_key DO NOTHING
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.user_id.as_uuid())
        .bind(purchase.product_id.as_uuid())
        .bind(purchase.status.as_str())
        .bind(&purchase.provider_ref)
        .bind(purchase.space.as_str())
        .bind(purchase.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert purchase: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn find_effective(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM purchases
             WHERE user_id = $1 AND product_id = $2 AND status = 'paid'
             ORDER BY created_at DESC
             LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load purchase: {}", e),
            )
        })?;

        row.map(Purchase::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM purchases WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list purchases: {}", e),
            )
        })?;

        rows.into_iter().map(Purchase::try_from).collect()
    }

    async fn set_status_by_provider_ref(
        &self,
        provider_ref: &str,
        status: PurchaseStatus,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "UPDATE purchases SET status = $2 WHERE provider_ref = $1 AND status <> $2",
        )
        .bind(provider_ref)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update purchase status: {}", e),
            )
        })?;

        Ok(result.rows_affected())
    }
}
