//! Payment repository port.

use async_trait::async_trait;

use crate::domain::billing::{Payment, PaymentProvider};
use crate::domain::foundation::{DomainError, PaymentId};

/// Repository port for Payment persistence.
///
/// The (provider, external transaction id) pair is unique; implementors
/// must back it with a unique constraint so a replayed prepare cannot
/// create a second record even if it slips past the ledger.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment record.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if (provider, external_tx_id) already exists
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Update an existing payment (finalization).
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound` if the id does not exist
    async fn update(&self, payment: &Payment) -> Result<(), DomainError>;

    /// Find a payment by its internal id.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Find a payment by its provider-assigned transaction id.
    async fn find_by_external_tx(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
    ) -> Result<Option<Payment>, DomainError>;
}
