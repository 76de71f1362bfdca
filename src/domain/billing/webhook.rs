//! Normalized webhook events and reconciliation outcomes.
//!
//! Every provider adapter verifies its own wire format and reduces the
//! request to a `NormalizedEvent`; the orchestrator answers with a
//! `ReconcileOutcome` which the same adapter renders back into the
//! provider's response vocabulary. The orchestrator itself never sees
//! provider-specific fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ParentId, PaymentId, Timestamp};

use super::{BusinessRejection, Payment, PaymentStatus, Tariff, VerificationError};

/// Reference to the account a two-phase payment is buying for.
///
/// Checkout links embed it as `"{parent_id}:{tariff}"`; providers echo
/// it back opaquely in their account / merchant_trans_id field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRef {
    pub parent_id: ParentId,
    pub tariff: Tariff,
}

impl AccountRef {
    /// Encodes the reference for embedding in a checkout link.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.parent_id, self.tariff)
    }

    /// Parses a provider-echoed account reference.
    ///
    /// An unparsable reference cannot name a real order, so it is an
    /// account-not-found rejection rather than a malformed request.
    pub fn parse(raw: &str) -> Result<Self, BusinessRejection> {
        let (parent, tariff) = raw
            .split_once(':')
            .ok_or(BusinessRejection::AccountNotFound)?;
        let parent_id = parent
            .parse::<ParentId>()
            .map_err(|_| BusinessRejection::AccountNotFound)?;
        let tariff = tariff
            .parse::<Tariff>()
            .map_err(|_| BusinessRejection::AccountNotFound)?;
        Ok(Self { parent_id, tariff })
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Mutating webhook phase, part of the idempotency ledger key.
///
/// Two-phase providers deliver prepare and complete for the same
/// external transaction id; they are distinct deliveries and each is
/// replay-protected independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookPhase {
    /// Single-phase notify (Stars).
    Notify,

    /// Two-phase first leg: transaction may proceed, payment is Pending.
    Prepare,

    /// Two-phase second leg: transaction finalized (success or failure).
    Complete,
}

impl WebhookPhase {
    /// Stable code used in the ledger key.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookPhase::Notify => "notify",
            WebhookPhase::Prepare => "prepare",
            WebhookPhase::Complete => "complete",
        }
    }
}

impl fmt::Display for WebhookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Provider-agnostic payment event extracted by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    /// Payability check without any mutation (Payme
    /// CheckPerformTransaction). Validates account and amount only.
    Probe {
        account: String,
        amount_uzs: i64,
        request_id: Option<serde_json::Value>,
    },

    /// Two-phase prepare: create or look up the Pending payment.
    Prepare {
        external_tx_id: String,
        account: String,
        amount_uzs: i64,
        request_id: Option<serde_json::Value>,
    },

    /// Two-phase complete: finalize the Pending payment.
    Complete {
        external_tx_id: String,
        /// True for a successful completion, false for a provider-side
        /// cancellation or failure.
        success: bool,
        request_id: Option<serde_json::Value>,
    },

    /// Single-phase success: verify-and-apply in one step (Stars).
    InstantSuccess {
        external_tx_id: String,
        payer: ParentId,
        amount_uzs: i64,
        currency: String,
    },

    /// Read-only state query (Payme CheckTransaction).
    Inquiry {
        external_tx_id: String,
        request_id: Option<serde_json::Value>,
    },
}

impl NormalizedEvent {
    /// Ledger phase for mutating events; None for read-only ones.
    pub fn phase(&self) -> Option<WebhookPhase> {
        match self {
            NormalizedEvent::Prepare { .. } => Some(WebhookPhase::Prepare),
            NormalizedEvent::Complete { .. } => Some(WebhookPhase::Complete),
            NormalizedEvent::InstantSuccess { .. } => Some(WebhookPhase::Notify),
            NormalizedEvent::Probe { .. } | NormalizedEvent::Inquiry { .. } => None,
        }
    }

    /// External transaction id, when the event carries one.
    pub fn external_tx_id(&self) -> Option<&str> {
        match self {
            NormalizedEvent::Prepare { external_tx_id, .. }
            | NormalizedEvent::Complete { external_tx_id, .. }
            | NormalizedEvent::InstantSuccess { external_tx_id, .. }
            | NormalizedEvent::Inquiry { external_tx_id, .. } => Some(external_tx_id),
            NormalizedEvent::Probe { .. } => None,
        }
    }
}

/// Immutable view of a payment used when rendering provider responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub payment_id: PaymentId,
    pub external_tx_id: String,
    pub status: PaymentStatus,
    pub created_at: Timestamp,
    pub finalized_at: Option<Timestamp>,
}

impl From<&Payment> for PaymentSnapshot {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            external_tx_id: payment.external_tx_id.clone(),
            status: payment.status,
            created_at: payment.created_at,
            finalized_at: payment.finalized_at,
        }
    }
}

/// Result of reconciling one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Probe passed: the transaction may proceed.
    Allowed,

    /// Prepare recorded a Pending payment.
    Prepared(PaymentSnapshot),

    /// Complete finalized the payment as Success.
    Completed(PaymentSnapshot),

    /// Complete finalized the payment as Failed.
    Cancelled(PaymentSnapshot),

    /// Inquiry answer: current payment state, no mutation.
    State(PaymentSnapshot),

    /// Request failed authenticity or shape checks.
    Denied(VerificationError),

    /// Definite business rejection; do not retry.
    Rejected(BusinessRejection),

    /// Infrastructure failure; everything rolled back, retry welcome.
    Transient,
}

impl ReconcileOutcome {
    /// True when the business effect was (or had previously been) applied.
    pub fn accepted(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Allowed
                | ReconcileOutcome::Prepared(_)
                | ReconcileOutcome::Completed(_)
                | ReconcileOutcome::Cancelled(_)
                | ReconcileOutcome::State(_)
        )
    }
}

/// Provider-facing response: an HTTP status plus a JSON body in the
/// provider's own vocabulary. The HTTP layer forwards it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ProviderResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }
}
