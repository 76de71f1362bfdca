//! Subscription status query.
//!
//! Read-only view behind the bot's status command: whether the parent
//! currently has access, and how long it lasts.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{SubscriptionStatus, Tariff};
use crate::domain::foundation::{DomainError, ParentId, Timestamp};
use crate::ports::SubscriptionRepository;

/// Snapshot of a parent's subscription standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusView {
    pub status: SubscriptionStatus,
    pub tariff: Tariff,
    pub has_access: bool,
    pub in_grace: bool,
    pub expires_at: Timestamp,
    pub days_remaining: i64,
    pub cancellation_pending: bool,
}

/// Answers status queries from the parent's latest subscription record.
pub struct StatusQuery {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl StatusQuery {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    /// The parent's standing at `now`, or `None` if they never
    /// subscribed.
    pub async fn status_for(
        &self,
        parent_id: &ParentId,
        now: Timestamp,
    ) -> Result<Option<SubscriptionStatusView>, DomainError> {
        let Some(subscription) = self.subscriptions.find_latest_for_parent(parent_id).await? else {
            return Ok(None);
        };

        Ok(Some(SubscriptionStatusView {
            status: subscription.status,
            tariff: subscription.tariff,
            has_access: subscription.has_access(now),
            in_grace: subscription.status == SubscriptionStatus::Grace,
            expires_at: subscription.expires_at,
            days_remaining: subscription.days_remaining(now),
            cancellation_pending: subscription.status == SubscriptionStatus::Cancelled
                && subscription.has_access(now),
        }))
    }
}
