//! Idempotency ledger port - at-most-once processing of webhook deliveries.
//!
//! The ledger is the concurrency gate for every provider-sourced event:
//! no component may mutate billing state for a webhook without first
//! reserving its (provider, phase, external transaction id) key here.
//!
//! ## Reservation protocol
//!
//! 1. `check_and_reserve` - first delivery wins the reservation
//!    (`FirstSeen`); a concurrent duplicate observes `InFlight` and is
//!    answered with a transient retry response; a finished duplicate
//!    observes `AlreadyProcessed` with the stored response, replayed
//!    verbatim.
//! 2. The caller runs the business transaction.
//! 3. `record_outcome` finalizes the entry, or `release` frees the
//!    reservation when the transaction rolled back.
//!
//! ## Crash recovery
//!
//! A reservation whose holder died before step 3 must not wedge the
//! transaction forever: reservations older than the TTL passed to
//! `check_and_reserve` are retaken by the next delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{PaymentProvider, ProviderResponse, WebhookPhase};
use crate::domain::foundation::{DomainError, Timestamp};

/// Outcome of the first processing of a webhook delivery, stored for
/// replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    /// Whether the business effect was applied.
    pub accepted: bool,

    /// Exact provider-facing response; replays return it unchanged.
    pub response: ProviderResponse,

    /// When the outcome was recorded.
    pub recorded_at: Timestamp,
}

/// Result of attempting to reserve a webhook delivery key.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// First sight of this key; the caller holds the reservation and
    /// must finish with `record_outcome` or `release`.
    FirstSeen,

    /// Another delivery of the same key is being processed right now
    /// (reservation younger than the TTL).
    InFlight,

    /// This key was already fully processed; the stored outcome is
    /// returned without re-running anything.
    AlreadyProcessed(RecordedOutcome),
}

/// Ledger of externally-supplied transaction identifiers.
///
/// Entries are kept after processing for replay detection and may be
/// pruned only after a provider-specific retention window.
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Atomically check the key and reserve it if unseen.
    ///
    /// A stale reservation (older than `ttl_secs` relative to `now`) is
    /// retaken and reported as `FirstSeen`.
    async fn check_and_reserve(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        now: Timestamp,
        ttl_secs: u64,
    ) -> Result<Reservation, DomainError>;

    /// Finalize a held reservation with the outcome to replay.
    async fn record_outcome(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
        outcome: RecordedOutcome,
    ) -> Result<(), DomainError>;

    /// Free a held reservation after a rolled-back transaction so the
    /// provider's retry is not forced to wait out the TTL.
    async fn release(
        &self,
        provider: PaymentProvider,
        phase: WebhookPhase,
        external_tx_id: &str,
    ) -> Result<(), DomainError>;

    /// Delete finalized entries recorded before `cutoff`.
    /// Returns the number of entries removed.
    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn IdempotencyLedger) {}
    }

    #[test]
    fn recorded_outcome_serializes_for_storage() {
        let outcome = RecordedOutcome {
            accepted: true,
            response: ProviderResponse::ok(serde_json::json!({"ok": true})),
            recorded_at: Timestamp::now(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: RecordedOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
