//! Telegram Stars webhook adapter.
//!
//! Single-phase provider: one signed notification reports a finished
//! payment in the in-platform currency. The notification carries no
//! account reference, so the tariff is resolved later from the exact
//! amount.
//!
//! # Security
//!
//! - Hex HMAC-SHA256 signature over
//!   `"{transaction_id}.{payer_id}.{amount}.{currency}"`
//! - Constant-time comparison via `subtle`
//! - Secret handled via `secrecy::SecretString`

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::billing::{
    BusinessRejection, NormalizedEvent, PaymentProvider, ProviderResponse, ReconcileOutcome,
    VerificationError,
};
use crate::domain::foundation::ParentId;
use crate::ports::{PaymentAdapter, RawWebhook};

type HmacSha256 = Hmac<Sha256>;

/// The only currency Stars notifications may carry.
const STARS_CURRENCY: &str = "XTR";

/// Notification body as delivered by the bot platform.
#[derive(Debug, Deserialize)]
struct StarsNotification {
    transaction_id: String,
    amount: i64,
    currency: String,
    payer_id: ParentId,
    signature: String,
}

/// Telegram Stars payment adapter.
pub struct StarsAdapter {
    webhook_secret: SecretString,
}

impl StarsAdapter {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: SecretString::new(webhook_secret.into()),
        }
    }

    /// Verify the notification signature using HMAC-SHA256.
    ///
    /// Constant-time comparison over the hex digests.
    fn verify_signature(&self, notification: &StarsNotification) -> Result<(), VerificationError> {
        let signed_payload = format!(
            "{}.{}.{}.{}",
            notification.transaction_id,
            notification.payer_id,
            notification.amount,
            notification.currency
        );

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| VerificationError::InvalidSignature)?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        let matches = expected
            .as_bytes()
            .ct_eq(notification.signature.as_bytes())
            .unwrap_u8()
            == 1;
        if !matches {
            tracing::warn!(
                transaction_id = %notification.transaction_id,
                "Invalid Stars notification signature"
            );
            return Err(VerificationError::InvalidSignature);
        }
        Ok(())
    }

    fn rejection_code(rejection: &BusinessRejection) -> &'static str {
        match rejection {
            BusinessRejection::AccountNotFound => "account_not_found",
            BusinessRejection::SubscriptionNotPayable => "not_payable",
            BusinessRejection::AmountMismatch { .. } => "amount_mismatch",
            BusinessRejection::UnknownTransaction => "unknown_transaction",
        }
    }
}

impl PaymentAdapter for StarsAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stars
    }

    fn verify(&self, raw: &RawWebhook) -> Result<NormalizedEvent, VerificationError> {
        let notification: StarsNotification = serde_json::from_slice(&raw.body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stars notification");
            VerificationError::MalformedRequest(format!("Invalid JSON: {}", e))
        })?;

        self.verify_signature(&notification)?;

        if notification.currency != STARS_CURRENCY {
            return Err(VerificationError::MalformedRequest(format!(
                "Unsupported currency: {}",
                notification.currency
            )));
        }
        if notification.amount <= 0 {
            return Err(VerificationError::MalformedRequest(
                "Amount must be positive".to_string(),
            ));
        }

        Ok(NormalizedEvent::InstantSuccess {
            external_tx_id: notification.transaction_id,
            payer: notification.payer_id,
            amount_uzs: notification.amount,
            currency: notification.currency,
        })
    }

    fn build_response(
        &self,
        event: Option<&NormalizedEvent>,
        outcome: &ReconcileOutcome,
    ) -> ProviderResponse {
        let transaction_id = event.and_then(NormalizedEvent::external_tx_id);

        match outcome {
            ReconcileOutcome::Completed(snapshot) => ProviderResponse::ok(json!({
                "ok": true,
                "transaction_id": snapshot.external_tx_id,
            })),
            // Single-phase providers never produce the other accepted
            // outcomes; answer ok so the platform stops redelivering.
            outcome if outcome.accepted() => ProviderResponse::ok(json!({
                "ok": true,
                "transaction_id": transaction_id,
            })),
            ReconcileOutcome::Denied(VerificationError::InvalidSignature) => {
                ProviderResponse::with_status(
                    401,
                    json!({"ok": false, "error_code": "invalid_signature"}),
                )
            }
            ReconcileOutcome::Denied(_) => ProviderResponse::with_status(
                400,
                json!({"ok": false, "error_code": "malformed_request"}),
            ),
            ReconcileOutcome::Rejected(rejection) => ProviderResponse::ok(json!({
                "ok": false,
                "error_code": Self::rejection_code(rejection),
                "transaction_id": transaction_id,
            })),
            ReconcileOutcome::Transient => ProviderResponse::with_status(
                503,
                json!({"ok": false, "error_code": "retry"}),
            ),
            // Accepted outcomes are matched above.
            _ => ProviderResponse::ok(json!({"ok": true, "transaction_id": transaction_id})),
        }
    }
}
