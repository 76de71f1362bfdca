//! In-memory event recorder.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::domain::foundation::DomainError;
use crate::ports::EventRecorder;

/// One captured audit event.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub event: String,
    pub attributes: Value,
}

/// In-memory implementation of the EventRecorder port.
#[derive(Default)]
pub struct InMemoryEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl InMemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in record order.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of all captured events, in record order.
    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event.clone())
            .collect()
    }
}

#[async_trait]
impl EventRecorder for InMemoryEventRecorder {
    async fn record(&self, event: &str, attributes: Value) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(RecordedEvent {
            event: event.to_string(),
            attributes,
        });
        Ok(())
    }
}
