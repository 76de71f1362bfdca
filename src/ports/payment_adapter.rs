//! Payment adapter port - per-provider webhook translation.
//!
//! Each payment provider speaks its own wire protocol (transport,
//! signature scheme, error vocabulary). An adapter owns both
//! directions of that translation: inbound verification into a
//! provider-neutral `NormalizedEvent`, and outbound rendering of a
//! `ReconcileOutcome` into the exact response shape the provider's
//! retry logic expects.
//!
//! Adapters are pure with respect to billing state: they never touch
//! repositories or the ledger, and verification happens before any
//! business lookup so a forged request is rejected without leaking
//! account information.

use std::collections::HashMap;

use crate::domain::billing::{
    NormalizedEvent, PaymentProvider, ProviderResponse, ReconcileOutcome, VerificationError,
};

/// Raw inbound webhook material, captured before any parsing.
#[derive(Debug, Clone, Default)]
pub struct RawWebhook {
    /// Request body bytes (empty for query-parameter providers).
    pub body: Vec<u8>,

    /// Decoded query parameters (empty for body-based providers).
    pub query: HashMap<String, String>,

    /// `Authorization` header, when present.
    pub auth_header: Option<String>,
}

impl RawWebhook {
    pub fn from_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }
}

/// Translation boundary between one provider's wire protocol and the
/// reconciliation core.
pub trait PaymentAdapter: Send + Sync {
    /// Which provider this adapter speaks for.
    fn provider(&self) -> PaymentProvider;

    /// Authenticate the request and normalize it into a neutral event.
    ///
    /// Must be constant-time with respect to secret material and must
    /// not consult billing state.
    fn verify(&self, raw: &RawWebhook) -> Result<NormalizedEvent, VerificationError>;

    /// Render the reconciliation outcome in the provider's response
    /// vocabulary.
    ///
    /// `event` is the normalized event when verification succeeded and
    /// `None` when rendering a pure verification failure.
    fn build_response(
        &self,
        event: Option<&NormalizedEvent>,
        outcome: &ReconcileOutcome,
    ) -> ProviderResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_adapter_is_object_safe() {
        fn _accepts_dyn(_adapter: &dyn PaymentAdapter) {}
    }

    #[test]
    fn raw_webhook_builders_populate_fields() {
        let body = RawWebhook::from_body(b"{}".to_vec()).with_auth("Basic abc");
        assert_eq!(body.body, b"{}");
        assert_eq!(body.auth_header.as_deref(), Some("Basic abc"));

        let mut params = HashMap::new();
        params.insert("action".to_string(), "0".to_string());
        let query = RawWebhook::from_query(params);
        assert_eq!(query.query.get("action").map(String::as_str), Some("0"));
        assert!(query.body.is_empty());
    }
}
