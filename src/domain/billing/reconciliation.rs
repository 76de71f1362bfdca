//! Pure reconciliation decisions: what a successful payment does to a
//! parent's subscription.
//!
//! Kept free of I/O so the renewal-versus-creation rules are testable in
//! isolation; the orchestrator re-reads current state transactionally
//! and feeds it in here before persisting the result.

use crate::domain::foundation::{DomainError, ParentId, PaymentId, SubscriptionId, Timestamp};

use super::{Subscription, Tariff};

/// Effect of a successful payment on the subscription table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// No Active-or-Grace subscription existed; a fresh one starts now.
    Created(Subscription),

    /// The current subscription was extended (and Grace cleared).
    Renewed(Subscription),
}

impl SubscriptionChange {
    /// The resulting subscription, however it was produced.
    pub fn subscription(&self) -> &Subscription {
        match self {
            SubscriptionChange::Created(sub) | SubscriptionChange::Renewed(sub) => sub,
        }
    }
}

/// Applies a successful payment to the parent's current subscription.
///
/// `current` is the parent's Active-or-Grace subscription if one exists.
/// A cancelled or expired record never appears here: the invariant is
/// one Active-or-Grace subscription per parent, so a payment from a
/// parent whose previous subscription is Cancelled or Expired starts a
/// brand-new record.
///
/// Renewal sets `expiry = max(previous expiry, now) + tariff duration`
/// and records the (possibly changed) tariff.
///
/// The applied change stamps `payment_id` onto the subscription, so a
/// retried delivery of the same payment can be recognized against the
/// stored record instead of extending the period twice.
pub fn apply_successful_payment(
    current: Option<Subscription>,
    parent_id: ParentId,
    payment_id: PaymentId,
    tariff: Tariff,
    duration_days: i64,
    now: Timestamp,
) -> Result<SubscriptionChange, DomainError> {
    match current {
        Some(mut sub) => {
            sub.renew(duration_days, now)?;
            sub.tariff = tariff;
            sub.last_payment_id = Some(payment_id);
            Ok(SubscriptionChange::Renewed(sub))
        }
        None => {
            let mut sub =
                Subscription::start(SubscriptionId::new(), parent_id, tariff, duration_days, now);
            sub.last_payment_id = Some(payment_id);
            Ok(SubscriptionChange::Created(sub))
        }
    }
}
