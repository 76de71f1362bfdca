//! Notification port - user-facing messages about subscription changes.
//!
//! Delivery is best-effort from the core's point of view: a failed
//! notification is logged and never rolls back the billing transaction
//! that triggered it.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::billing::NotificationKind;
use crate::domain::foundation::{DomainError, ParentId};

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send one notification to a parent.
    ///
    /// `payload` carries kind-specific fields (tariff, expiry date,
    /// amounts) for the message template.
    async fn notify(
        &self,
        parent_id: ParentId,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), DomainError>;
}
