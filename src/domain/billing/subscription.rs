//! Subscription aggregate entity.
//!
//! A subscription represents one parent's paid access to the assistant.
//! At most one Active-or-Grace subscription exists per parent at any
//! time; that invariant is enforced both here (renewals target the
//! current record) and by a partial unique index at the database level.
//!
//! # Design Decisions
//!
//! - **Money in whole UZS**: integer sums, no floats
//! - **Explicit clock**: every transition takes `now` so the sweeper and
//!   tests are deterministic
//! - **Optimistic concurrency**: `version` is compare-and-swapped by the
//!   repository so a renewal and a sweep cannot interleave on stale state
//! - **Deferred cancellation**: cancelling marks the record, access runs
//!   until the original expiry

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, ParentId, PaymentId, StateMachine, SubscriptionId, Timestamp,
};

use super::{SubscriptionStatus, Tariff};

/// Subscription aggregate.
///
/// # Invariants
///
/// - `expires_at >= starts_at`
/// - Status changes only through the state machine in
///   [`SubscriptionStatus`]
/// - Once `Cancelled`, the record only ever moves to `Expired`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier for this subscription.
    pub id: SubscriptionId,

    /// Parent who owns this subscription.
    pub parent_id: ParentId,

    /// Tariff the parent is paying for.
    pub tariff: Tariff,

    /// Current lifecycle status.
    pub status: SubscriptionStatus,

    /// Start of the paid period.
    pub starts_at: Timestamp,

    /// End of the paid period.
    pub expires_at: Timestamp,

    /// Whether the parent opted into automatic renewal.
    pub auto_renew: bool,

    /// When the parent requested cancellation (if they did).
    pub cancelled_at: Option<Timestamp>,

    /// Payment whose period this record currently reflects. A retried
    /// delivery of that payment must not extend the period again.
    pub last_payment_id: Option<PaymentId>,

    /// When the record was created.
    pub created_at: Timestamp,

    /// When the record was last updated.
    pub updated_at: Timestamp,

    /// Optimistic concurrency version, incremented by the repository on
    /// every successful update.
    pub version: i32,
}

impl Subscription {
    /// Creates a new Active subscription from a first successful payment.
    pub fn start(
        id: SubscriptionId,
        parent_id: ParentId,
        tariff: Tariff,
        duration_days: i64,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            parent_id,
            tariff,
            status: SubscriptionStatus::Active,
            starts_at: now,
            expires_at: now.add_days(duration_days),
            auto_renew: false,
            cancelled_at: None,
            last_payment_id: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Applies a renewal payment while Active or in Grace.
    ///
    /// The new expiry is `max(current expiry, now) + duration`, so an
    /// early renewal stacks onto the remaining period while a late one
    /// counts from the payment moment. Grace is cleared.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the subscription is Cancelled
    /// or Expired.
    pub fn renew(&mut self, duration_days: i64, now: Timestamp) -> Result<(), DomainError> {
        if !self.status.is_renewable() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot renew a {:?} subscription", self.status),
            ));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        let base = if self.expires_at.is_after(&now) {
            self.expires_at
        } else {
            now
        };
        self.expires_at = base.add_days(duration_days);
        self.updated_at = now;
        Ok(())
    }

    /// Moves an Active subscription past its expiry into Grace.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription is not Active or the period
    /// has not actually ended yet.
    pub fn enter_grace(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot enter grace from {:?}", self.status),
            ));
        }
        if !now.is_after(&self.expires_at) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Subscription period has not ended yet",
            ));
        }
        self.transition_to(SubscriptionStatus::Grace)?;
        self.updated_at = now;
        Ok(())
    }

    /// Fully expires a subscription whose grace window has elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error unless the subscription is in Grace and `now` is
    /// past `expires_at + grace_window_days`.
    pub fn expire_from_grace(
        &mut self,
        grace_window_days: i64,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Grace {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot expire from {:?}", self.status),
            ));
        }
        if !now.is_after(&self.grace_deadline(grace_window_days)) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Grace window has not elapsed yet",
            ));
        }
        self.transition_to(SubscriptionStatus::Expired)?;
        self.updated_at = now;
        Ok(())
    }

    /// Expires a cancelled subscription once its paid period ends.
    ///
    /// Cancelled records skip the grace window: the parent asked to stop,
    /// so there is nothing to remind them about.
    pub fn expire_cancelled(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Cancelled {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot expire-cancelled from {:?}", self.status),
            ));
        }
        if !now.is_after(&self.expires_at) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Cancelled subscription is still within its paid period",
            ));
        }
        self.transition_to(SubscriptionStatus::Expired)?;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the subscription, effective at the current expiry.
    ///
    /// Access continues until `expires_at`; the record is never renewed
    /// afterwards.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Cancelled)?;
        self.cancelled_at = Some(now);
        self.auto_renew = false;
        self.updated_at = now;
        Ok(())
    }

    /// Checks whether this subscription grants access right now.
    pub fn has_access(&self, now: Timestamp) -> bool {
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::Grace => true,
            SubscriptionStatus::Cancelled => !now.is_after(&self.expires_at),
            SubscriptionStatus::Expired => false,
        }
    }

    /// End of the grace window for this subscription.
    pub fn grace_deadline(&self, grace_window_days: i64) -> Timestamp {
        self.expires_at.add_days(grace_window_days)
    }

    /// Whole days of paid access remaining, zero once the period ended.
    pub fn days_remaining(&self, now: Timestamp) -> i64 {
        now.days_until(&self.expires_at)
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}
