//! Ports - trait seams between the billing domain and the outside world.
//!
//! Adapters (postgres, in-memory, provider protocol handlers, the chat
//! transport) implement these; application handlers depend only on the
//! traits.

mod event_recorder;
mod idempotency_ledger;
mod notification_sender;
mod parent_directory;
mod payment_adapter;
mod payment_repository;
mod subscription_repository;

pub use event_recorder::EventRecorder;
pub use idempotency_ledger::{IdempotencyLedger, RecordedOutcome, Reservation};
pub use notification_sender::NotificationSender;
pub use parent_directory::ParentDirectory;
pub use payment_adapter::{PaymentAdapter, RawWebhook};
pub use payment_repository::PaymentRepository;
pub use subscription_repository::SubscriptionRepository;
