//! Payment entity and payment provider enumeration.
//!
//! A Payment records one externally-initiated transaction. The external
//! transaction id is unique within a provider's namespace; a duplicate
//! delivery is a replay and must never be applied twice (enforced by the
//! idempotency ledger, see `ports::IdempotencyLedger`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DomainError, ErrorCode, ParentId, PaymentId, StateMachine, SubscriptionId, Timestamp,
    ValidationError,
};

use super::Tariff;

/// Payment provider a transaction originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// In-platform currency (Telegram Stars). Single-phase notify.
    Stars,

    /// Payme merchant API (JSON-RPC 2.0). Two-phase.
    Payme,

    /// Click merchant API (query-parameter). Two-phase.
    Click,
}

impl PaymentProvider {
    /// Stable wire/storage code for this provider.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentProvider::Stars => "stars",
            PaymentProvider::Payme => "payme",
            PaymentProvider::Click => "click",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for PaymentProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stars" => Ok(PaymentProvider::Stars),
            "payme" => Ok(PaymentProvider::Payme),
            "click" => Ok(PaymentProvider::Click),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("Unknown payment provider: {}", other),
            )),
        }
    }
}

/// Payment lifecycle status.
///
/// A payment finalizes exactly once: Pending moves to Success or Failed
/// and never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created at prepare time (or never, for single-phase providers).
    Pending,

    /// Provider confirmed the money moved.
    Success,

    /// Provider reported the transaction failed or was cancelled.
    Failed,
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Pending, Success) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Success, Failed],
            Success => vec![],
            Failed => vec![],
        }
    }
}

/// Payment entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Internal identifier.
    pub id: PaymentId,

    /// Parent this payment belongs to.
    pub parent_id: ParentId,

    /// Provider that initiated the transaction.
    pub provider: PaymentProvider,

    /// Provider-assigned transaction identifier. Unique per provider.
    pub external_tx_id: String,

    /// Amount in whole UZS.
    pub amount_uzs: i64,

    /// ISO currency code ("UZS", or "XTR" for Stars).
    pub currency: String,

    /// Tariff this payment is buying.
    pub tariff: Tariff,

    /// Current status.
    pub status: PaymentStatus,

    /// Subscription this payment funded, set at reconciliation time.
    pub subscription_id: Option<SubscriptionId>,

    /// Free-form provider reference (e.g. Payme transaction state).
    pub external_ref: Option<String>,

    /// When the provider first contacted us about this transaction.
    pub created_at: Timestamp,

    /// When the payment reached Success or Failed.
    pub finalized_at: Option<Timestamp>,
}

impl Payment {
    /// Creates a Pending payment at prepare time.
    pub fn pending(
        id: PaymentId,
        parent_id: ParentId,
        provider: PaymentProvider,
        external_tx_id: impl Into<String>,
        amount_uzs: i64,
        currency: impl Into<String>,
        tariff: Tariff,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            parent_id,
            provider,
            external_tx_id: external_tx_id.into(),
            amount_uzs,
            currency: currency.into(),
            tariff,
            status: PaymentStatus::Pending,
            subscription_id: None,
            external_ref: None,
            created_at: now,
            finalized_at: None,
        }
    }

    /// Finalizes the payment as successful.
    ///
    /// # Errors
    ///
    /// Returns `PaymentAlreadyFinalized` if the payment is not Pending.
    pub fn mark_success(
        &mut self,
        subscription_id: SubscriptionId,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Success)?;
        self.subscription_id = Some(subscription_id);
        self.finalized_at = Some(now);
        Ok(())
    }

    /// Finalizes the payment as failed. The subscription is untouched.
    pub fn mark_failed(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Failed)?;
        self.finalized_at = Some(now);
        Ok(())
    }

    /// True while the payment awaits its complete phase.
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::PaymentAlreadyFinalized,
                format!(
                    "Payment {} already finalized as {:?}",
                    self.external_tx_id, self.status
                ),
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_payment() -> Payment {
        Payment::pending(
            PaymentId::new(),
            ParentId::new(),
            PaymentProvider::Payme,
            "tx-1",
            99_000,
            "UZS",
            Tariff::Monthly,
            Timestamp::now(),
        )
    }

    #[test]
    fn provider_codes_round_trip() {
        for provider in [
            PaymentProvider::Stars,
            PaymentProvider::Payme,
            PaymentProvider::Click,
        ] {
            let parsed: PaymentProvider = provider.code().parse().unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn pending_payment_has_no_subscription_yet() {
        let payment = pending_payment();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.subscription_id.is_none());
        assert!(payment.finalized_at.is_none());
    }

    #[test]
    fn mark_success_links_subscription() {
        let mut payment = pending_payment();
        let sub_id = SubscriptionId::new();

        payment.mark_success(sub_id, Timestamp::now()).unwrap();

        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.subscription_id, Some(sub_id));
        assert!(payment.finalized_at.is_some());
    }

    #[test]
    fn mark_failed_leaves_subscription_unset() {
        let mut payment = pending_payment();

        payment.mark_failed(Timestamp::now()).unwrap();

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.subscription_id.is_none());
    }

    #[test]
    fn payment_finalizes_exactly_once() {
        let mut payment = pending_payment();
        payment.mark_failed(Timestamp::now()).unwrap();

        let err = payment
            .mark_success(SubscriptionId::new(), Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentAlreadyFinalized);
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn success_and_failed_are_terminal() {
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }
}
