//! Billing domain - subscriptions, payments, tariffs and the
//! reconciliation rules that tie them together.

mod errors;
mod events;
mod payment;
mod reconciliation;
mod subscription;
mod subscription_status;
mod tariff;
mod webhook;

pub use errors::{BusinessRejection, VerificationError};
pub use events::NotificationKind;
pub use payment::{Payment, PaymentProvider, PaymentStatus};
pub use reconciliation::{apply_successful_payment, SubscriptionChange};
pub use subscription::Subscription;
pub use subscription_status::SubscriptionStatus;
pub use tariff::{Tariff, TariffPlan, TariffTable};
pub use webhook::{
    AccountRef, NormalizedEvent, PaymentSnapshot, ProviderResponse, ReconcileOutcome, WebhookPhase,
};
