//! In-memory payment repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::billing::{Payment, PaymentProvider};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId};
use crate::ports::PaymentRepository;

/// In-memory implementation of the PaymentRepository port.
///
/// Enforces the (provider, external_tx_id) uniqueness the PostgreSQL
/// implementation backs with a unique index.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: Mutex<HashMap<PaymentId, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored payments, for test assertions.
    pub fn all(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut store = self.payments.lock().unwrap();
        let duplicate = store.values().any(|existing| {
            existing.provider == payment.provider
                && existing.external_tx_id == payment.external_tx_id
        });
        if duplicate {
            return Err(DomainError::validation(
                "external_tx_id",
                format!(
                    "Transaction already recorded: {}/{}",
                    payment.provider, payment.external_tx_id
                ),
            ));
        }
        store.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut store = self.payments.lock().unwrap();
        let stored = store.get_mut(&payment.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", payment.id),
            )
        })?;
        *stored = payment.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payments.lock().unwrap().get(id).cloned())
    }

    async fn find_by_external_tx(
        &self,
        provider: PaymentProvider,
        external_tx_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .find(|payment| {
                payment.provider == provider && payment.external_tx_id == external_tx_id
            })
            .cloned())
    }
}
