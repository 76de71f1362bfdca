//! PostgreSQL implementation of IdempotencyLedger.
//!
//! One row per (provider, phase, external_tx_id). A row begins as a
//! reservation and is finalized in place with the stored response; the
//! insert-or-nothing on the primary key is what makes the first
//! delivery win across process instances.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::billing::{PaymentProvider, ProviderResponse, WebhookPhase};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{IdempotencyLedger, RecordedOutcome, Reservation};

/// PostgreSQL implementation of IdempotencyLedger.
#[derive(Clone)]
pub struct PostgresIdempotencyLedger {
    pool: PgPool,
}

impl PostgresIdempotencyLedger {
    /// Creates a new PostgresIdempotencyLedger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyLedger for PostgresIdempotencyLedger {
    async fn check_and_reserve(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        now: Timestamp,
        ttl_secs: u64,
    ) -> Result<Reservation, DomainError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_ledger (provider, phase, external_tx_id, state, reserved_at)
            VALUES ($1, $2, $3, 'reserved', $4)
            ON CONFLICT (provider, phase, external_tx_id) DO NOTHING
            "#,
        )
        .bind(provider.code())
        .bind(phase.code())
        .bind(external_tx_id)
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to reserve webhook key: {}", e),
            )
        })?;

        if inserted.rows_affected() == 1 {
            return Ok(Reservation::FirstSeen);
        }

        let row = sqlx::query(
            r#"
            SELECT state, accepted, response, recorded_at
            FROM webhook_ledger
            WHERE provider = $1 AND phase = $2 AND external_tx_id = $3
            "#,
        )
        .bind(provider.code())
        .bind(phase.code())
        .bind(external_tx_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch ledger entry: {}", e),
            )
        })?;

        let row = match row {
            Some(row) => row,
            // Entry released between the insert and the select; retry
            // once by re-reserving.
            None => {
                let retaken = sqlx::query(
                    r#"
                    INSERT INTO webhook_ledger (provider, phase, external_tx_id, state, reserved_at)
                    VALUES ($1, $2, $3, 'reserved', $4)
                    ON CONFLICT (provider, phase, external_tx_id) DO NOTHING
                    "#,
                )
                .bind(provider.code())
                .bind(phase.code())
                .bind(external_tx_id)
                .bind(now.as_datetime())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to re-reserve webhook key: {}", e),
                    )
                })?;
                return Ok(if retaken.rows_affected() == 1 {
                    Reservation::FirstSeen
                } else {
                    Reservation::InFlight
                });
            }
        };

        let state: String = row
            .try_get("state")
            .map_err(|e| column_error("state", e))?;

        if state == "finalized" {
            let accepted: bool = row
                .try_get("accepted")
                .map_err(|e| column_error("accepted", e))?;
            let response_json: serde_json::Value = row
                .try_get("response")
                .map_err(|e| column_error("response", e))?;
            let response: ProviderResponse =
                serde_json::from_value(response_json).map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Corrupt stored webhook response: {}", e),
                    )
                })?;
            let recorded_at: chrono::DateTime<chrono::Utc> = row
                .try_get("recorded_at")
                .map_err(|e| column_error("recorded_at", e))?;

            return Ok(Reservation::AlreadyProcessed(RecordedOutcome {
                accepted,
                response,
                recorded_at: Timestamp::from_datetime(recorded_at),
            }));
        }

        // Reserved by someone else: retake only if the reservation is
        // older than the TTL (the holder presumably died mid-flight).
        let cutoff = now.minus_secs(ttl_secs);
        let retaken = sqlx::query(
            r#"
            UPDATE webhook_ledger SET reserved_at = $4
            WHERE provider = $1 AND phase = $2 AND external_tx_id = $3
              AND state = 'reserved' AND reserved_at < $5
            "#,
        )
        .bind(provider.code())
        .bind(phase.code())
        .bind(external_tx_id)
        .bind(now.as_datetime())
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to retake stale reservation: {}", e),
            )
        })?;

        Ok(if retaken.rows_affected() == 1 {
            Reservation::FirstSeen
        } else {
            Reservation::InFlight
        })
    }

    async fn record_outcome(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        outcome: RecordedOutcome,
    ) -> Result<(), DomainError> {
        let response_json = serde_json::to_value(&outcome.response).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to serialize webhook response: {}", e),
            )
        })?;

        sqlx::query(
            r#"
            UPDATE webhook_ledger SET
                state = 'finalized',
                accepted = $4,
                response = $5,
                recorded_at = $6
            WHERE provider = $1 AND phase = $2 AND external_tx_id = $3
            "#,
        )
        .bind(provider.code())
        .bind(phase.code())
        .bind(external_tx_id)
        .bind(outcome.accepted)
        .bind(response_json)
        .bind(outcome.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record webhook outcome: {}", e),
            )
        })?;

        Ok(())
    }

    async fn release(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
    ) -> Result<(), DomainError> {
        // Finalized entries are never released.
        sqlx::query(
            r#"
            DELETE FROM webhook_ledger
            WHERE provider = $1 AND phase = $2 AND external_tx_id = $3
              AND state = 'reserved'
            "#,
        )
        .bind(provider.code())
        .bind(phase.code())
        .bind(external_tx_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to release reservation: {}", e),
            )
        })?;

        Ok(())
    }

    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM webhook_ledger WHERE state = 'finalized' AND recorded_at < $1",
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to prune ledger: {}", e),
            )
        })?;

        Ok(result.rows_affected())
    }
}

fn column_error(column: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to get {}: {}", column, e),
    )
}
