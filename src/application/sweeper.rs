//! ExpirySweeper - background service for time-driven status changes.
//!
//! Payments move subscriptions forward; the sweeper moves them down:
//! 1. Active records past their expiry enter Grace
//! 2. Grace records past the grace deadline become Expired
//! 3. Cancelled records past their paid period become Expired
//!
//! Each record is swept in isolation: a version conflict or database
//! error on one subscription is logged and skipped, to be retried on
//! the next cycle. Missed cycles are harmless because every transition
//! compares against wall-clock time, not cycle count.
//!
//! Each cycle also prunes finalized webhook ledger entries older than
//! the retention window; providers stop redelivering long before then.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::time;

use crate::domain::billing::{NotificationKind, Subscription};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{EventRecorder, IdempotencyLedger, NotificationSender, SubscriptionRepository};

/// Configuration for the ExpirySweeper service.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to run a sweep cycle.
    pub interval: Duration,

    /// Days of access after expiry before hard expiration.
    pub grace_window_days: i64,

    /// Days a finalized webhook ledger entry is kept for replay.
    pub ledger_retention_days: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            grace_window_days: 3,
            ledger_retention_days: 90,
        }
    }
}

/// Counts of transitions applied by one sweep cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub entered_grace: usize,
    pub expired_from_grace: usize,
    pub expired_cancelled: usize,
    pub skipped: usize,
    pub pruned_ledger_entries: u64,
}

/// Background service that applies expiry transitions.
pub struct ExpirySweeper {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn IdempotencyLedger>,
    notifier: Arc<dyn NotificationSender>,
    recorder: Arc<dyn EventRecorder>,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn IdempotencyLedger>,
        notifier: Arc<dyn NotificationSender>,
        recorder: Arc<dyn EventRecorder>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            notifier,
            recorder,
            config,
        }
    }

    /// Run the sweep loop until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Expiry sweeper shutting down");
                        return;
                    }
                }

                _ = interval.tick() => {
                    let report = self.run_once(Timestamp::now()).await;
                    if report != SweepReport::default() {
                        tracing::info!(
                            entered_grace = report.entered_grace,
                            expired_from_grace = report.expired_from_grace,
                            expired_cancelled = report.expired_cancelled,
                            skipped = report.skipped,
                            pruned_ledger_entries = report.pruned_ledger_entries,
                            "Sweep cycle applied transitions"
                        );
                    }
                }
            }
        }
    }

    /// Run one sweep cycle at the given instant.
    ///
    /// Public so tests (and a manual admin trigger) can drive sweeps
    /// with a controlled clock.
    pub async fn run_once(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();

        match self.subscriptions.list_active_past_expiry(now).await {
            Ok(subscriptions) => {
                for subscription in subscriptions {
                    match self.enter_grace(subscription, now).await {
                        Ok(()) => report.entered_grace += 1,
                        Err(err) => {
                            report.skipped += 1;
                            tracing::warn!(error = %err, "Skipped grace transition");
                        }
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "Failed to list expired Active subscriptions"),
        }

        match self
            .subscriptions
            .list_grace_past_deadline(now, self.config.grace_window_days)
            .await
        {
            Ok(subscriptions) => {
                for subscription in subscriptions {
                    match self.expire_from_grace(subscription, now).await {
                        Ok(()) => report.expired_from_grace += 1,
                        Err(err) => {
                            report.skipped += 1;
                            tracing::warn!(error = %err, "Skipped expiry transition");
                        }
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "Failed to list Grace subscriptions past deadline"),
        }

        match self.subscriptions.list_cancelled_past_expiry(now).await {
            Ok(subscriptions) => {
                for subscription in subscriptions {
                    match self.expire_cancelled(subscription, now).await {
                        Ok(()) => report.expired_cancelled += 1,
                        Err(err) => {
                            report.skipped += 1;
                            tracing::warn!(error = %err, "Skipped cancelled expiry");
                        }
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "Failed to list expired Cancelled subscriptions"),
        }

        let cutoff = now.minus_days(self.config.ledger_retention_days);
        match self.ledger.prune_before(cutoff).await {
            Ok(pruned) => report.pruned_ledger_entries = pruned,
            Err(err) => tracing::error!(error = %err, "Failed to prune webhook ledger"),
        }

        report
    }

    async fn enter_grace(
        &self,
        mut subscription: Subscription,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        subscription.enter_grace(now)?;
        self.subscriptions.update(&subscription).await?;

        self.announce(
            &subscription,
            NotificationKind::GraceEntered,
            "grace_entered",
            json!({
                "tariff": subscription.tariff.code(),
                "expires_at": subscription.expires_at,
                "grace_deadline": subscription.grace_deadline(self.config.grace_window_days),
            }),
        )
        .await;
        Ok(())
    }

    async fn expire_from_grace(
        &self,
        mut subscription: Subscription,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        subscription.expire_from_grace(self.config.grace_window_days, now)?;
        self.subscriptions.update(&subscription).await?;

        self.announce(
            &subscription,
            NotificationKind::SubscriptionExpired,
            "subscription_expired",
            json!({
                "tariff": subscription.tariff.code(),
                "expired_from": "grace",
            }),
        )
        .await;
        Ok(())
    }

    async fn expire_cancelled(
        &self,
        mut subscription: Subscription,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        subscription.expire_cancelled(now)?;
        self.subscriptions.update(&subscription).await?;

        // The parent asked for the cancellation; expiry of a cancelled
        // record is bookkeeping, not news. Audit only.
        if let Err(err) = self
            .recorder
            .record(
                "subscription_expired",
                json!({
                    "subscription_id": subscription.id.to_string(),
                    "parent_id": subscription.parent_id.to_string(),
                    "expired_from": "cancelled",
                }),
            )
            .await
        {
            tracing::error!(error = %err, "Audit event recording failed");
        }
        Ok(())
    }

    async fn announce(
        &self,
        subscription: &Subscription,
        kind: NotificationKind,
        event: &str,
        payload: serde_json::Value,
    ) {
        if let Err(err) = self
            .notifier
            .notify(subscription.parent_id, kind, payload.clone())
            .await
        {
            tracing::error!(
                parent_id = %subscription.parent_id,
                error = %err,
                "Notification delivery failed"
            );
        }

        let mut attributes = payload;
        attributes["subscription_id"] = json!(subscription.id.to_string());
        attributes["parent_id"] = json!(subscription.parent_id.to_string());
        if let Err(err) = self.recorder.record(event, attributes).await {
            tracing::error!(event, error = %err, "Audit event recording failed");
        }
    }
}
