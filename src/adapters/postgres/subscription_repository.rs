//! PostgreSQL implementation of SubscriptionRepository.
//!
//! The upsert is a single-row compare-and-set on `event_ts`: an update
//! only wins if its provider event timestamp is at least as new as the
//! stored one. Out-of-order deliveries lose the CAS and report `Stale`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{AudienceSpace, SubscriptionRecord, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{SubscriptionRepository, UpsertOutcome};

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: Uuid,
    status: String,
    price_ref: String,
    quantity: i32,
    cancel_at_period_end: bool,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    space: String,
    metadata: serde_json::Value,
    event_ts: i64,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let space = AudienceSpace::parse(&row.space).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid space value: {}", row.space),
            )
        })?;

        let metadata = serde_json::from_value(row.metadata).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid subscription metadata: {}", e),
            )
        })?;

        Ok(SubscriptionRecord {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            status: SubscriptionStatus::parse(&row.status),
            price_ref: row.price_ref,
            quantity: row.quantity.max(0) as u32,
            cancel_at_period_end: row.cancel_at_period_end,
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            space,
            metadata,
            event_ts: Timestamp::from_unix_secs(row.event_ts),
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, status, price_ref, quantity, cancel_at_period_end, \
     current_period_start, current_period_end, space, metadata, event_ts";

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert(&self, record: &SubscriptionRecord) -> Result<UpsertOutcome, DomainError> {
        let metadata = serde_json::to_value(&record.metadata).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to serialize metadata: {}", e),
            )
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, price_ref, quantity, cancel_at_period_end,
                current_period_start, current_period_end, space, metadata, event_ts, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                status = EXCLUDED.status,
                price_ref = EXCLUDED.price_ref,
                quantity = EXCLUDED.quantity,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                space = EXCLUDED.space,
                metadata = EXCLUDED.metadata,
                event_ts = EXCLUDED.event_ts,
                updated_at = now()
            WHERE subscriptions.event_ts <= EXCLUDED.event_ts
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id.as_uuid())
        .bind(record.status.as_str())
        .bind(&record.price_ref)
        .bind(record.quantity as i32)
        .bind(record.cancel_at_period_end)
        .bind(record.current_period_start.as_datetime())
        .bind(record.current_period_end.as_datetime())
        .bind(record.space.as_str())
        .bind(metadata)
        .bind(record.event_ts.as_unix_secs())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to upsert subscription: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            Ok(UpsertOutcome::Stale)
        } else {
            Ok(UpsertOutcome::Applied)
        }
    }

    async fn find_by_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load subscription: {}", e),
            )
        })?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list subscriptions: {}", e),
            )
        })?;

        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }

    async fn list_for_user_in_space(
        &self,
        user_id: &UserId,
        space: AudienceSpace,
    ) -> Result<Vec<SubscriptionRecord>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND space = $2",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .bind(space.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list subscriptions in space: {}", e),
            )
        })?;

        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }
}
