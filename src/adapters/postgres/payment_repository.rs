//! PostgreSQL implementation of PaymentRepository.
//!
//! A unique constraint on (provider, external_tx_id) backs the one
//! record-per-transaction rule even if a replayed prepare slips past
//! the ledger.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::billing::{Payment, PaymentProvider, PaymentStatus, Tariff};
use crate::domain::foundation::{
    DomainError, ErrorCode, ParentId, PaymentId, SubscriptionId, Timestamp,
};
use crate::ports::PaymentRepository;

/// PostgreSQL implementation of PaymentRepository.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    /// Creates a new PostgresPaymentRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, parent_id, provider, external_tx_id, amount_uzs, currency, \
     tariff, status, subscription_id, external_ref, created_at, finalized_at";

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, parent_id, provider, external_tx_id, amount_uzs, currency,
                tariff, status, subscription_id, external_ref, created_at, finalized_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.parent_id.as_uuid())
        .bind(payment.provider.code())
        .bind(&payment.external_tx_id)
        .bind(payment.amount_uzs)
        .bind(&payment.currency)
        .bind(payment.tariff.code())
        .bind(status_to_str(payment.status))
        .bind(payment.subscription_id.as_ref().map(|id| *id.as_uuid()))
        .bind(payment.external_ref.as_deref())
        .bind(payment.created_at.as_datetime())
        .bind(payment.finalized_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!(
                    "Transaction {}/{} already recorded",
                    payment.provider, payment.external_tx_id
                ),
            )),
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert payment: {}", e),
            )),
        }
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                subscription_id = $3,
                external_ref = $4,
                finalized_at = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(status_to_str(payment.status))
        .bind(payment.subscription_id.as_ref().map(|id| *id.as_uuid()))
        .bind(payment.external_ref.as_deref())
        .bind(payment.finalized_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update payment: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", payment.id),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch payment: {}", e),
            )
        })?;

        row.map(row_to_payment).transpose()
    }

    async fn find_by_external_tx(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE provider = $1 AND external_tx_id = $2",
            SELECT_COLUMNS
        ))
        .bind(provider.code())
        .bind(external_tx_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch payment by external id: {}", e),
            )
        })?;

        row.map(row_to_payment).transpose()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Success => "success",
        PaymentStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> Result<PaymentStatus, DomainError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "success" => Ok(PaymentStatus::Success),
        "failed" => Ok(PaymentStatus::Failed),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid payment status: {}", s),
        )),
    }
}

fn column_error(column: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to get {}: {}", column, e),
    )
}

fn row_to_payment(row: sqlx::postgres::PgRow) -> Result<Payment, DomainError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| column_error("id", e))?;
    let parent_id: uuid::Uuid = row
        .try_get("parent_id")
        .map_err(|e| column_error("parent_id", e))?;

    let provider_str: String = row
        .try_get("provider")
        .map_err(|e| column_error("provider", e))?;
    let provider: PaymentProvider = provider_str.parse().map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid provider: {}", e))
    })?;

    let external_tx_id: String = row
        .try_get("external_tx_id")
        .map_err(|e| column_error("external_tx_id", e))?;
    let amount_uzs: i64 = row
        .try_get("amount_uzs")
        .map_err(|e| column_error("amount_uzs", e))?;
    let currency: String = row
        .try_get("currency")
        .map_err(|e| column_error("currency", e))?;

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

    let subscription_id: Option<uuid::Uuid> = row
        .try_get("subscription_id")
        .map_err(|e| column_error("subscription_id", e))?;
    let external_ref: Option<String> = row
        .try_get("external_ref")
        .map_err(|e| column_error("external_ref", e))?;
    let created_at: chrono::DateTime<chrono::Utc> = row
        .try_get("created_at")
        .map_err(|e| column_error("created_at", e))?;
    let finalized_at: Option<chrono::DateTime<chrono::Utc>> = row
        .try_get("finalized_at")
        .map_err(|e| column_error("finalized_at", e))?;

    Ok(Payment {
        id: PaymentId::from_uuid(id),
        parent_id: ParentId::from_uuid(parent_id),
        provider,
        external_tx_id,
        amount_uzs,
        currency,
        tariff,
        status,
        subscription_id: subscription_id.map(SubscriptionId::from_uuid),
        external_ref,
        created_at: Timestamp::from_datetime(created_at),
        finalized_at: finalized_at.map(Timestamp::from_datetime),
    })
}
