//! Shared value objects and error types for the billing domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ParentId, PaymentId, SubscriptionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
