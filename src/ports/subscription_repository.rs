//! Subscription repository port.
//!
//! # Design
//!
//! - **Optimistic concurrency**: `update` is compare-and-swap on the
//!   aggregate's `version`; a concurrent writer surfaces as
//!   `VersionConflict` and the caller re-reads and retries (or, for the
//!   sweeper, skips until the next cycle). This keeps a renewal and a
//!   sweep from interleaving on stale state across process instances.
//! - **One current record**: `find_current_for_parent` returns the
//!   single Active-or-Grace subscription; the database backs this with
//!   a partial unique index on `parent_id`.

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, ParentId, SubscriptionId, Timestamp};

/// Repository port for Subscription aggregate persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a newly started subscription.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the parent already has an Active-or-Grace
    ///   subscription
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription, compare-and-swapping on its
    /// `version`. On success the stored version becomes `version + 1`.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` if another writer got there first
    /// - `SubscriptionNotFound` if the id does not exist
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Find a subscription by its id.
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// The parent's current Active-or-Grace subscription, if any.
    ///
    /// Cancelled and Expired records are historical and never returned
    /// here; a payment from such a parent starts a new subscription.
    async fn find_current_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The parent's most recent subscription of any status, for status
    /// queries and cancellation.
    async fn find_latest_for_parent(
        &self,
        parent_id: &ParentId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Active subscriptions whose period ended before `now`.
    /// Sweep candidates for the grace transition.
    async fn list_active_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Grace subscriptions whose grace window elapsed before `now`.
    async fn list_grace_past_deadline(
        &self,
        now: Timestamp,
        grace_window_days: i64,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Cancelled subscriptions whose paid period ended before `now`.
    async fn list_cancelled_past_expiry(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
