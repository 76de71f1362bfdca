//! In-memory notification sender.
//!
//! Captures notifications for test assertions instead of talking to the
//! bot platform.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::domain::billing::NotificationKind;
use crate::domain::foundation::{DomainError, ParentId};
use crate::ports::NotificationSender;

/// One captured notification.
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub parent_id: ParentId,
    pub kind: NotificationKind,
    pub payload: Value,
}

/// In-memory implementation of the NotificationSender port.
#[derive(Default)]
pub struct InMemoryNotificationSender {
    sent: Mutex<Vec<SentNotification>>,
}

impl InMemoryNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured notifications, in send order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Kinds sent to one parent, in send order.
    pub fn kinds_for(&self, parent_id: &ParentId) -> Vec<NotificationKind> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|notification| notification.parent_id == *parent_id)
            .map(|notification| notification.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for InMemoryNotificationSender {
    async fn notify(
        &self,
        parent_id: ParentId,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), DomainError> {
        self.sent.lock().unwrap().push(SentNotification {
            parent_id,
            kind,
            payload,
        });
        Ok(())
    }
}
