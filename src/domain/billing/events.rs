//! Notification kinds emitted by the billing core.
//!
//! Delivery happens through `ports::NotificationSender` and is
//! fire-and-forget: a missed notification never rolls back a
//! subscription transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the parent should be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// First payment reconciled; subscription is live.
    SubscriptionActivated,

    /// Renewal payment reconciled; expiry pushed forward.
    SubscriptionRenewed,

    /// Period ended; the parent is in the grace window.
    GraceEntered,

    /// Grace window elapsed; access revoked.
    SubscriptionExpired,

    /// Cancellation acknowledged; access continues until expiry.
    /// Distinct wording from an immediate revocation.
    CancellationScheduled,

    /// A payment attempt failed; subscription state unchanged.
    PaymentFailed,
}

impl NotificationKind {
    /// Stable code used in notification payloads and the event log.
    pub fn code(&self) -> &'static str {
        match self {
            NotificationKind::SubscriptionActivated => "subscription_activated",
            NotificationKind::SubscriptionRenewed => "subscription_renewed",
            NotificationKind::GraceEntered => "grace_entered",
            NotificationKind::SubscriptionExpired => "subscription_expired",
            NotificationKind::CancellationScheduled => "cancellation_scheduled",
            NotificationKind::PaymentFailed => "payment_failed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
