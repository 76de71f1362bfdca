//! Event recorder port - append-only audit trail of billing activity.
//!
//! Recording is best-effort: audit failures are logged by callers and
//! never affect the outcome of the operation being recorded.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::DomainError;

#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Append one audit event.
    ///
    /// `event` is a stable snake_case name ("payment_completed",
    /// "subscription_expired"); `attributes` carries the details.
    async fn record(&self, event: &str, attributes: Value) -> Result<(), DomainError>;
}
