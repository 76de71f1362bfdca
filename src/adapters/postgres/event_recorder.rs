//! PostgreSQL implementation of EventRecorder.
//!
//! Append-only `event_log` table. Callers treat recording as
//! best-effort, so every failure surfaces as a plain DatabaseError and
//! is logged at the call site.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::EventRecorder;

/// PostgreSQL implementation of EventRecorder.
#[derive(Clone)]
pub struct PostgresEventRecorder {
    pool: PgPool,
}

impl PostgresEventRecorder {
    /// Creates a new PostgresEventRecorder.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRecorder for PostgresEventRecorder {
    async fn record(&self, event: &str, attributes: Value) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO event_log (event, attributes, occurred_at) VALUES ($1, $2, $3)",
        )
        .bind(event)
        .bind(attributes)
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to append event: {}", e),
            )
        })?;

        Ok(())
    }
}
