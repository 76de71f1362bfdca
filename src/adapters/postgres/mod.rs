//! PostgreSQL adapters - Database implementations of the persistence ports.
//!
//! - `PostgresSubscriptionRepository` - Subscription aggregates with CAS updates
//! - `PostgresPaymentRepository` - Payment records, unique per provider transaction
//! - `PostgresIdempotencyLedger` - Webhook reservation and replay storage
//! - `PostgresParentDirectory` - Existence checks against the bot's parents table
//! - `PostgresEventRecorder` - Append-only audit trail
//! - `PostgresNotificationOutbox` - Notifications handed off to the bot process

mod event_recorder;
mod idempotency_ledger;
mod notification_outbox;
mod parent_directory;
mod payment_repository;
mod subscription_repository;

pub use event_recorder::PostgresEventRecorder;
pub use idempotency_ledger::PostgresIdempotencyLedger;
pub use notification_outbox::PostgresNotificationOutbox;
pub use parent_directory::PostgresParentDirectory;
pub use payment_repository::PostgresPaymentRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
