//! Manual subscription cancellation.
//!
//! Cancellation is deferred: the status flips to Cancelled right away
//! but access continues until the already-paid period ends. The sweeper
//! hard-expires the record afterwards.

use std::sync::Arc;

use serde_json::json;

use crate::domain::billing::NotificationKind;
use crate::domain::foundation::{DomainError, ErrorCode, ParentId, Timestamp};
use crate::ports::{EventRecorder, NotificationSender, SubscriptionRepository};

/// Acknowledgement returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelAck {
    /// Access continues until this moment; nothing was revoked now.
    pub access_until: Timestamp,
}

/// Cancels a parent's current subscription.
pub struct CancelSubscription {
    subscriptions: Arc<dyn SubscriptionRepository>,
    notifier: Arc<dyn NotificationSender>,
    recorder: Arc<dyn EventRecorder>,
}

impl CancelSubscription {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        notifier: Arc<dyn NotificationSender>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            subscriptions,
            notifier,
            recorder,
        }
    }

    /// Cancel the parent's Active-or-Grace subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` when the parent has nothing to cancel
    /// - `VersionConflict` when a concurrent writer won; the caller may
    ///   simply retry
    pub async fn cancel(
        &self,
        parent_id: &ParentId,
        now: Timestamp,
    ) -> Result<CancelAck, DomainError> {
        let Some(mut subscription) = self.subscriptions.find_current_for_parent(parent_id).await?
        else {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("No current subscription for parent {}", parent_id),
            ));
        };

        subscription.cancel(now)?;
        self.subscriptions.update(&subscription).await?;

        tracing::info!(
            parent_id = %parent_id,
            subscription_id = %subscription.id,
            access_until = %subscription.expires_at,
            "Subscription cancellation scheduled"
        );

        if let Err(err) = self
            .notifier
            .notify(
                *parent_id,
                NotificationKind::CancellationScheduled,
                json!({
                    "tariff": subscription.tariff.code(),
                    "access_until": subscription.expires_at,
                }),
            )
            .await
        {
            tracing::error!(parent_id = %parent_id, error = %err, "Notification delivery failed");
        }

        if let Err(err) = self
            .recorder
            .record(
                "cancellation_scheduled",
                json!({
                    "subscription_id": subscription.id.to_string(),
                    "parent_id": parent_id.to_string(),
                    "access_until": subscription.expires_at,
                }),
            )
            .await
        {
            tracing::error!(error = %err, "Audit event recording failed");
        }

        Ok(CancelAck {
            access_until: subscription.expires_at,
        })
    }
}
