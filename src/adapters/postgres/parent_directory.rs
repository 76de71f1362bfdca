//! PostgreSQL implementation of ParentDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, ParentId};
use crate::ports::ParentDirectory;

/// PostgreSQL implementation of ParentDirectory.
///
/// Reads the bot-owned `parents` table; this side never writes it.
#[derive(Clone)]
pub struct PostgresParentDirectory {
    pool: PgPool,
}

impl PostgresParentDirectory {
    /// Creates a new PostgresParentDirectory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParentDirectory for PostgresParentDirectory {
    async fn exists(&self, parent_id: &ParentId) -> Result<bool, DomainError> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parents WHERE id = $1")
            .bind(parent_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to check parent existence: {}", e),
                )
            })?;

        Ok(result.0 > 0)
    }
}
