//! In-memory subscription repository.
//!
//! Thread-safe via internal `Mutex`. Backs tests and local development;
//! the version compare-and-swap mirrors the PostgreSQL implementation
//! so concurrency tests exercise the same failure mode.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::billing::{Subscription, SubscriptionStatus};
use crate::domain::foundation::{
    DomainError, ErrorCode, ParentId, SubscriptionId, Timestamp,
};
use crate::ports::SubscriptionRepository;

/// In-memory implementation of the SubscriptionRepository port.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored subscriptions, for test assertions.
    pub fn all(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut store = self.subscriptions.lock().unwrap();
        let has_current = store.values().any(|existing| {
            existing.parent_id == subscription.parent_id
                && matches!(
                    existing.status,
                    SubscriptionStatus::Active | SubscriptionStatus::Grace
                )
        });
        if has_current {
            return Err(DomainError::validation(
                "parent_id",
                "Parent already has a current subscription",
            ));
        }
        store.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut store = self.subscriptions.lock().unwrap();
        let stored = store.get_mut(&subscription.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription.id),
            )
        })?;
        if stored.version != subscription.version {
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!(
                    "Subscription {} version {} does not match stored {}",
                    subscription.id, subscription.version, stored.version
                ),
            ));
        }
        let mut updated = subscription.clone();
        updated.version += 1;
        *stored = updated;
        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.lock().unwrap().get(id).cloned())
    }

    async fn find_current_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|subscription| {
                subscription.parent_id == *parent_id
                    && matches!(
                        subscription.status,
                        SubscriptionStatus::Active | SubscriptionStatus::Grace
                    )
            })
            .cloned())
    }

    async fn find_latest_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|subscription| subscription.parent_id == *parent_id)
            .max_by_key(|subscription| subscription.created_at)
            .cloned())
    }

    async fn list_active_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|subscription| {
                subscription.status == SubscriptionStatus::Active
                    && subscription.expires_at.is_before(&now)
            })
            .cloned()
            .collect())
    }

    async fn list_grace_past_deadline(
        &self,
        now: Timestamp,
        grace_window_days: i64,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|subscription| {
                subscription.status == SubscriptionStatus::Grace
                    && subscription.grace_deadline(grace_window_days).is_before(&now)
            })
            .cloned()
            .collect())
    }

    async fn list_cancelled_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|subscription| {
                subscription.status == SubscriptionStatus::Cancelled
                    && subscription.expires_at.is_before(&now)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Tariff;

    fn started(parent_id: ParentId, now: Timestamp) -> Subscription {
        Subscription::start(SubscriptionId::new(), parent_id, Tariff::Monthly, 30, now)
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let repo = InMemorySubscriptionRepository::new();
        let subscription = started(ParentId::new(), Timestamp::now());

        repo.insert(&subscription).await.unwrap();

        let found = repo.find_by_id(&subscription.id).await.unwrap().unwrap();
        assert_eq!(found, subscription);
    }

    #[tokio::test]
    async fn second_current_subscription_is_rejected() {
        let repo = InMemorySubscriptionRepository::new();
        let parent_id = ParentId::new();
        let now = Timestamp::now();

        repo.insert(&started(parent_id, now)).await.unwrap();
        let err = repo.insert(&started(parent_id, now)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let repo = InMemorySubscriptionRepository::new();
        let now = Timestamp::now();
        let mut subscription = started(ParentId::new(), now);
        repo.insert(&subscription).await.unwrap();

        subscription.cancel(now).unwrap();
        repo.update(&subscription).await.unwrap();

        let stored = repo.find_by_id(&subscription.id).await.unwrap().unwrap();
        assert_eq!(stored.version, subscription.version + 1);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let repo = InMemorySubscriptionRepository::new();
        let now = Timestamp::now();
        let mut subscription = started(ParentId::new(), now);
        repo.insert(&subscription).await.unwrap();

        subscription.cancel(now).unwrap();
        repo.update(&subscription).await.unwrap();

        // Same in-memory version again: the store is already ahead.
        let err = repo.update(&subscription).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn current_lookup_ignores_cancelled() {
        let repo = InMemorySubscriptionRepository::new();
        let parent_id = ParentId::new();
        let now = Timestamp::now();
        let mut subscription = started(parent_id, now);
        repo.insert(&subscription).await.unwrap();

        subscription.cancel(now).unwrap();
        repo.update(&subscription).await.unwrap();

        assert!(repo
            .find_current_for_parent(&parent_id)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_latest_for_parent(&parent_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn sweep_listings_filter_by_status_and_time() {
        let repo = InMemorySubscriptionRepository::new();
        let now = Timestamp::now();

        // Active, expired a day ago.
        let expired = Subscription::start(
            SubscriptionId::new(),
            ParentId::new(),
            Tariff::Monthly,
            30,
            now.minus_days(31),
        );
        repo.insert(&expired).await.unwrap();

        // Active, still inside its period.
        let fresh = started(ParentId::new(), now);
        repo.insert(&fresh).await.unwrap();

        let past_expiry = repo.list_active_past_expiry(now).await.unwrap();
        assert_eq!(past_expiry.len(), 1);
        assert_eq!(past_expiry[0].id, expired.id);

        assert!(repo
            .list_grace_past_deadline(now, 3)
            .await
            .unwrap()
            .is_empty());
        assert!(repo.list_cancelled_past_expiry(now).await.unwrap().is_empty());
    }
}
