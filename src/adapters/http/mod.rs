//! HTTP adapters.
//!
//! Webhook endpoints for the payment providers. The bot-facing
//! operations (checkout, status, cancel) are consumed in-process by the
//! bot runtime and have no HTTP surface here.

mod webhooks;

pub use webhooks::{webhook_router, WebhookAppState};
