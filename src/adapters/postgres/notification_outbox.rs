//! PostgreSQL notification outbox.
//!
//! The billing service never talks to Telegram directly; it appends
//! notifications to an outbox table and the bot process delivers them.
//! This keeps the webhook path free of network calls to a third party.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::billing::NotificationKind;
use crate::domain::foundation::{DomainError, ErrorCode, ParentId, Timestamp};
use crate::ports::NotificationSender;

/// Outbox-backed implementation of NotificationSender.
#[derive(Clone)]
pub struct PostgresNotificationOutbox {
    pool: PgPool,
}

impl PostgresNotificationOutbox {
    /// Creates a new PostgresNotificationOutbox.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSender for PostgresNotificationOutbox {
    async fn notify(
        &self,
        parent_id: ParentId,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO notification_outbox (parent_id, kind, payload, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(parent_id.as_uuid())
        .bind(kind.code())
        .bind(payload)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to enqueue notification: {}", e),
            )
        })?;

        Ok(())
    }
}
