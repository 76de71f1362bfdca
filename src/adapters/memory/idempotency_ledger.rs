//! In-memory idempotency ledger.
//!
//! Mirrors the PostgreSQL ledger's reservation semantics, including
//! TTL-based recovery of abandoned reservations, so orchestrator tests
//! exercise the real replay paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::billing::{PaymentProvider, WebhookPhase};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{IdempotencyLedger, RecordedOutcome, Reservation};

#[derive(Debug, Clone)]
enum Entry {
    Reserved { reserved_at: Timestamp },
    Finalized(RecordedOutcome),
}

type LedgerKey = (PaymentProvider, WebhookPhase, String);

/// In-memory implementation of the IdempotencyLedger port.
#[derive(Default)]
pub struct InMemoryIdempotencyLedger {
    entries: Mutex<HashMap<LedgerKey, Entry>>,
}

impl InMemoryIdempotencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(provider: PaymentProvider, phase: WebhookPhase, external_tx_id: &str) -> LedgerKey {
        (provider, phase, external_tx_id.to_string())
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryIdempotencyLedger {
    async fn check_and_reserve(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        now: Timestamp,
        ttl_secs: u64,
    ) -> Result<Reservation, DomainError> {
        let mut entries = self.entries.lock().unwrap();
        let key = Self::key(provider, phase, external_tx_id);

        match entries.get(&key) {
            Some(Entry::Finalized(outcome)) => Ok(Reservation::AlreadyProcessed(outcome.clone())),
            Some(Entry::Reserved { reserved_at }) => {
                if reserved_at.plus_secs(ttl_secs).is_before(&now) {
                    // Holder died; retake the reservation.
                    tracing::warn!(
                        provider = %provider,
                        phase = %phase,
                        external_tx_id,
                        "Retaking stale webhook reservation"
                    );
                    entries.insert(key, Entry::Reserved { reserved_at: now });
                    Ok(Reservation::FirstSeen)
                } else {
                    Ok(Reservation::InFlight)
                }
            }
            None => {
                entries.insert(key, Entry::Reserved { reserved_at: now });
                Ok(Reservation::FirstSeen)
            }
        }
    }

    async fn record_outcome(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        outcome: RecordedOutcome,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            Self::key(provider, phase, external_tx_id),
            Entry::Finalized(outcome),
        );
        Ok(())
    }

    async fn release(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().unwrap();
        let key = Self::key(provider, phase, external_tx_id);
        // Only an open reservation may be released; a finalized entry
        // is immutable.
        if matches!(entries.get(&key), Some(Entry::Reserved { .. })) {
            entries.remove(&key);
        }
        Ok(())
    }

    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| match entry {
            Entry::Finalized(outcome) => !outcome.recorded_at.is_before(&cutoff),
            Entry::Reserved { .. } => true,
        });
        Ok((before - entries.len()) as u64)
    }
}
