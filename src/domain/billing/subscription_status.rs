//! Subscription status state machine.
//!
//! Defines all possible subscription states and valid transitions
//! according to the billing lifecycle.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Subscription lifecycle status.
///
/// There is no explicit "none" state: a parent without a subscription
/// simply has no record, and the first successful payment creates one
/// directly in `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid subscription within its period. Full access.
    Active,

    /// Period ended but still inside the grace window.
    /// Access continues while the parent is reminded to renew.
    Grace,

    /// Grace window elapsed without renewal. No access.
    Expired,

    /// Parent requested cancellation. Access continues until the
    /// original expiry, then the record expires; it is never renewed.
    Cancelled,
}

impl SubscriptionStatus {
    /// Returns true if this status can still grant access.
    ///
    /// For `Cancelled` the aggregate additionally checks the expiry
    /// timestamp, since access survives only until period end.
    pub fn may_have_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Grace | SubscriptionStatus::Cancelled
        )
    }

    /// Returns true if a renewal payment may target this subscription.
    ///
    /// Renewals apply while Active or in Grace. A cancelled record is
    /// immutable; an expired one requires a fresh subscription.
    pub fn is_renewable(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Grace)
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From ACTIVE
            (Active, Active) // Renewal extends the period
                | (Active, Grace)
                | (Active, Cancelled)
            // From GRACE
                | (Grace, Active) // Renewal clears grace
                | (Grace, Expired)
                | (Grace, Cancelled)
            // From CANCELLED
                | (Cancelled, Expired) // Sweeper, once the paid period ends
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Active => vec![Active, Grace, Cancelled],
            Grace => vec![Active, Expired, Cancelled],
            Cancelled => vec![Expired],
            Expired => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unit Tests - State Transitions

    #[test]
    fn active_can_renew_to_active() {
        let status = SubscriptionStatus::Active;
        assert!(status.can_transition_to(&SubscriptionStatus::Active));

        let result = status.transition_to(SubscriptionStatus::Active);
        assert_eq!(result, Ok(SubscriptionStatus::Active));
    }

    #[test]
    fn active_can_enter_grace() {
        let status = SubscriptionStatus::Active;
        assert!(status.can_transition_to(&SubscriptionStatus::Grace));
    }

    #[test]
    fn active_cannot_expire_directly() {
        // Expiry always passes through the grace window first.
        let status = SubscriptionStatus::Active;
        assert!(!status.can_transition_to(&SubscriptionStatus::Expired));
    }

    #[test]
    fn grace_can_recover_to_active() {
        let status = SubscriptionStatus::Grace;
        let result = status.transition_to(SubscriptionStatus::Active);
        assert_eq!(result, Ok(SubscriptionStatus::Active));
    }

    #[test]
    fn grace_can_expire() {
        let status = SubscriptionStatus::Grace;
        let result = status.transition_to(SubscriptionStatus::Expired);
        assert_eq!(result, Ok(SubscriptionStatus::Expired));
    }

    #[test]
    fn cancelled_can_only_expire() {
        let status = SubscriptionStatus::Cancelled;
        assert!(status.can_transition_to(&SubscriptionStatus::Expired));
        assert!(!status.can_transition_to(&SubscriptionStatus::Active));
        assert!(!status.can_transition_to(&SubscriptionStatus::Grace));
    }

    #[test]
    fn expired_is_terminal() {
        assert!(SubscriptionStatus::Expired.is_terminal());

        let result = SubscriptionStatus::Expired.transition_to(SubscriptionStatus::Active);
        assert!(result.is_err());
    }

    // Unit Tests - access / renewability

    #[test]
    fn access_statuses() {
        assert!(SubscriptionStatus::Active.may_have_access());
        assert!(SubscriptionStatus::Grace.may_have_access());
        assert!(SubscriptionStatus::Cancelled.may_have_access());
        assert!(!SubscriptionStatus::Expired.may_have_access());
    }

    #[test]
    fn only_active_and_grace_are_renewable() {
        assert!(SubscriptionStatus::Active.is_renewable());
        assert!(SubscriptionStatus::Grace.is_renewable());
        assert!(!SubscriptionStatus::Cancelled.is_renewable());
        assert!(!SubscriptionStatus::Expired.is_renewable());
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Grace,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
        ] {
            for target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&target),
                    "can_transition_to should return true for {:?} -> {:?}",
                    status,
                    target
                );
            }
        }
    }
}
