//! In-memory port implementations.
//!
//! Thread-safe via internal mutexes. Used by tests and local
//! development; semantics (version compare-and-swap, uniqueness,
//! reservation TTL) mirror the PostgreSQL adapters.

mod event_recorder;
mod idempotency_ledger;
mod notification_sender;
mod parent_directory;
mod payment_repository;
mod subscription_repository;

pub use event_recorder::{InMemoryEventRecorder, RecordedEvent};
pub use idempotency_ledger::InMemoryIdempotencyLedger;
pub use notification_sender::{InMemoryNotificationSender, SentNotification};
pub use parent_directory::InMemoryParentDirectory;
pub use payment_repository::InMemoryPaymentRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
