//! Application services.
//!
//! Use-case orchestration over the domain and ports: webhook
//! reconciliation, the expiry sweeper, checkout links, status queries
//! and manual cancellation.

mod cancel;
mod checkout;
mod reconcile;
mod status;
mod sweeper;

pub use cancel::{CancelAck, CancelSubscription};
pub use checkout::{CheckoutLink, CheckoutService};
pub use reconcile::ReconcileWebhookHandler;
pub use status::{StatusQuery, SubscriptionStatusView};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig};
