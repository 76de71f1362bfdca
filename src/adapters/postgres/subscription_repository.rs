//! PostgreSQL implementation of SubscriptionRepository.
//!
//! The one-current-record invariant is backed by a partial unique index
//! on `parent_id` over Active-and-Grace rows; `update` is a
//! compare-and-swap on the `version` column.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::billing::{Subscription, SubscriptionStatus, Tariff};
use crate::domain::foundation::{
    DomainError, ErrorCode, ParentId, PaymentId, SubscriptionId, Timestamp,
};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of SubscriptionRepository.
#[derive(Clone)]
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new PostgresSubscriptionRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, parent_id, tariff, status, starts_at, expires_at, \
     auto_renew, cancelled_at, last_payment_id, created_at, updated_at, version";

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, parent_id, tariff, status, starts_at, expires_at,
                auto_renew, cancelled_at, last_payment_id, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.parent_id.as_uuid())
        .bind(subscription.tariff.code())
        .bind(status_to_str(subscription.status))
        .bind(subscription.starts_at.as_datetime())
        .bind(subscription.expires_at.as_datetime())
        .bind(subscription.auto_renew)
        .bind(subscription.cancelled_at.as_ref().map(|t| *t.as_datetime()))
        .bind(subscription.last_payment_id.as_ref().map(|id| *id.as_uuid()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Parent {} already has a current subscription",
                    subscription.parent_id
                ),
            )),
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert subscription: {}", e),
            )),
        }
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                tariff = $3,
                status = $4,
                starts_at = $5,
                expires_at = $6,
                auto_renew = $7,
                cancelled_at = $8,
                last_payment_id = $9,
                updated_at = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.version)
        .bind(subscription.tariff.code())
        .bind(status_to_str(subscription.status))
        .bind(subscription.starts_at.as_datetime())
        .bind(subscription.expires_at.as_datetime())
        .bind(subscription.auto_renew)
        .bind(subscription.cancelled_at.as_ref().map(|t| *t.as_datetime()))
        .bind(subscription.last_payment_id.as_ref().map(|id| *id.as_uuid()))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update subscription: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a lost race.
            let exists: (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE id = $1")
                    .bind(subscription.id.as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        DomainError::new(
                            ErrorCode::DatabaseError,
                            format!("Failed to check subscription existence: {}", e),
                        )
                    })?;

            if exists.0 == 0 {
                return Err(DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription not found: {}", subscription.id),
                ));
            }
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!(
                    "Subscription {} was modified concurrently (expected version {})",
                    subscription.id, subscription.version
                ),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch subscription: {}", e),
            )
        })?;

        row.map(row_to_subscription).transpose()
    }

    async fn find_current_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE parent_id = $1 AND status IN ('active', 'grace')",
            SELECT_COLUMNS
        ))
        .bind(parent_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch current subscription: {}", e),
            )
        })?;

        row.map(row_to_subscription).transpose()
    }

    async fn find_latest_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE parent_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(parent_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch latest subscription: {}", e),
            )
        })?;

        row.map(row_to_subscription).transpose()
    }

    async fn list_active_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE status = 'active' AND expires_at < $1 \
             ORDER BY expires_at",
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list expired-active subscriptions: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_subscription).collect()
    }

    async fn list_grace_past_deadline(
        &self,
        now: Timestamp,
        grace_window_days: i64,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE status = 'grace' \
               AND expires_at + make_interval(days => $2::int) < $1 \
             ORDER BY expires_at",
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .bind(grace_window_days as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list grace-elapsed subscriptions: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_subscription).collect()
    }

    async fn list_cancelled_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE status = 'cancelled' AND expires_at < $1 \
             ORDER BY expires_at",
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list expired-cancelled subscriptions: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_subscription).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn status_to_str(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Grace => "grace",
        SubscriptionStatus::Expired => "expired",
        SubscriptionStatus::Cancelled => "cancelled",
    }
}

fn str_to_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    match s {
        "active" => Ok(SubscriptionStatus::Active),
        "grace" => Ok(SubscriptionStatus::Grace),
        "expired" => Ok(SubscriptionStatus::Expired),
        "cancelled" => Ok(SubscriptionStatus::Cancelled),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid subscription status: {}", s),
        )),
    }
}

fn column_error(column: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to get {}: {}", column, e),
    )
}

fn row_to_subscription(row: sqlx::postgres::PgRow) -> Result<Subscription, DomainError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| column_error("id", e))?;
    let parent_id: uuid::Uuid = row
        .try_get("parent_id")
        .map_err(|e| column_error("parent_id", e))?;

    let tariff_str: String = row
        .try_get("tariff")
        .map_err(|e| column_error("tariff", e))?;
    let tariff: Tariff = tariff_str.parse().map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid tariff: {}", e))
    })?;

    let status_str: String = row
        .try_get("status")
        .map_err(|e| column_error("status", e))?;
    let status = str_to_status(&status_str)?;

    let starts_at: chrono::DateTime<chrono::Utc> = row
        .try_get("starts_at")
        .map_err(|e| column_error("starts_at", e))?;
    let expires_at: chrono::DateTime<chrono::Utc> = row
        .try_get("expires_at")
        .map_err(|e| column_error("expires_at", e))?;
    let auto_renew: bool = row
        .try_get("auto_renew")
        .map_err(|e| column_error("auto_renew", e))?;
    let cancelled_at: Option<chrono::DateTime<chrono::Utc>> = row
        .try_get("cancelled_at")
        .map_err(|e| column_error("cancelled_at", e))?;
    let last_payment_id: Option<uuid::Uuid> = row
        .try_get("last_payment_id")
        .map_err(|e| column_error("last_payment_id", e))?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .map_err(|e| column_error("created_at", e))?;
    let updated_at: chrono::DateTime<chrono::Utc> = row
        .try_get("updated_at")
        .map_err(|e| column_error("updated_at", e))?;
    let version: i32 = row
        .try_get("version")
        .map_err(|e| column_error("version", e))?;

    Ok(Subscription {
        id: SubscriptionId::from_uuid(id),
        parent_id: ParentId::from_uuid(parent_id),
        tariff,
        status,
        starts_at: Timestamp::from_datetime(starts_at),
        expires_at: Timestamp::from_datetime(expires_at),
        auto_renew,
        cancelled_at: cancelled_at.map(Timestamp::from_datetime),
        last_payment_id: last_payment_id.map(PaymentId::from_uuid),
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
        version,
    })
}
