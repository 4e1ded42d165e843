//! PostgreSQL implementation of PendingCheckoutRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::AudienceSpace;
use crate::domain::foundation::{DomainError, ErrorCode, ProductId, Timestamp, UserId};
use crate::ports::{PendingCheckout, PendingCheckoutRepository};

/// PostgreSQL implementation of the PendingCheckoutRepository port.
pub struct PostgresPendingCheckoutRepository {
    pool: PgPool,
}

impl PostgresPendingCheckoutRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a pending checkout.
#[derive(Debug, sqlx::FromRow)]
struct PendingCheckoutRow {
    session_id: String,
    user_id: Uuid,
    product_id: Uuid,
    space: String,
    is_subscription: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingCheckoutRow> for PendingCheckout {
    type Error = DomainError;

    fn try_from(row: PendingCheckoutRow) -> Result<Self, Self::Error> {
        let space = AudienceSpace::parse(&row.space).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid space value: {}", row.space),
            )
        })?;

        Ok(PendingCheckout {
            session_id: row.session_id,
            user_id: UserId::from_uuid(row.user_id),
            product_id: ProductId::from_uuid(row.product_id),
            space,
            is_subscription: row.is_subscription,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl PendingCheckoutRepository for PostgresPendingCheckoutRepository {
    async fn save(&self, pending: &PendingCheckout) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO pending_checkouts (
                session_id, user_id, product_id, space, is_subscription, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                product_id = EXCLUDED.product_id,
                space = EXCLUDED.space,
                is_subscription = EXCLUDED.is_subscription
            "#,
        )
        .bind(&pending.session_id)
        .bind(pending.user_id.as_uuid())
        .bind(pending.product_id.as_uuid())
        .bind(pending.space.as_str())
        .bind(pending.is_subscription)
        .bind(pending.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save pending checkout: {}", e),
            )
        })?;

        Ok(())
    }

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingCheckout>, DomainError> {
        let row: Option<PendingCheckoutRow> = sqlx::query_as(
            "SELECT session_id, user_id, product_id, space, is_subscription, created_at
             FROM pending_checkouts WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load pending checkout: {}", e),
            )
        })?;

        row.map(PendingCheckout::try_from).transpose()
    }
}
