//! Click merchant API adapter (query-parameter two-phase).
//!
//! Click delivers both phases as signed query strings: `action=0` is
//! the prepare leg, `action=1` the complete leg. The `error` parameter
//! on the complete leg tells whether the payer finished or abandoned
//! the transaction.
//!
//! # Security
//!
//! - `sign_string` is the hex MD5 of
//!   `click_trans_id + service_id + secret + merchant_trans_id
//!   [+ merchant_prepare_id] + amount + action + sign_time`
//!   (prepare id only on the complete leg)
//! - Constant-time comparison via `subtle`
//! - Responses always answer HTTP 200 with Click's numeric `error`
//!   codes and a fixed `error_note` phrase

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::domain::billing::{
    BusinessRejection, NormalizedEvent, PaymentProvider, ProviderResponse, ReconcileOutcome,
    VerificationError,
};
use crate::ports::{PaymentAdapter, RawWebhook};

// Click merchant API error vocabulary.
const ERR_SUCCESS: i64 = 0;
const ERR_SIGN_CHECK: i64 = -1;
const ERR_INCORRECT_AMOUNT: i64 = -2;
const ERR_ACCOUNT_NOT_FOUND: i64 = -5;
const ERR_TRANSACTION_NOT_FOUND: i64 = -6;
const ERR_REQUEST: i64 = -8;
const ERR_TRANSACTION_CANCELLED: i64 = -9;

const ACTION_PREPARE: &str = "0";
const ACTION_COMPLETE: &str = "1";

/// Click merchant API adapter.
pub struct ClickAdapter {
    service_id: String,
    secret_key: SecretString,
}

impl ClickAdapter {
    pub fn new(service_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            secret_key: SecretString::new(secret_key.into()),
        }
    }

    fn param<'a>(raw: &'a RawWebhook, key: &str) -> Result<&'a str, VerificationError> {
        raw.query.get(key).map(String::as_str).ok_or_else(|| {
            VerificationError::MalformedRequest(format!("Missing param: {}", key))
        })
    }

    /// Check sign_string against the MD5 of the concatenated params.
    fn verify_sign(
        &self,
        raw: &RawWebhook,
        click_trans_id: &str,
        merchant_trans_id: &str,
        merchant_prepare_id: Option<&str>,
        amount: &str,
        action: &str,
        sign_time: &str,
    ) -> Result<(), VerificationError> {
        let sign_string = Self::param(raw, "sign_string")?;

        let mut hasher = Md5::new();
        hasher.update(click_trans_id.as_bytes());
        hasher.update(self.service_id.as_bytes());
        hasher.update(self.secret_key.expose_secret().as_bytes());
        hasher.update(merchant_trans_id.as_bytes());
        if let Some(prepare_id) = merchant_prepare_id {
            hasher.update(prepare_id.as_bytes());
        }
        hasher.update(amount.as_bytes());
        hasher.update(action.as_bytes());
        hasher.update(sign_time.as_bytes());
        let expected = hex::encode(hasher.finalize());

        let matches = expected
            .as_bytes()
            .ct_eq(sign_string.to_lowercase().as_bytes())
            .unwrap_u8()
            == 1;
        if !matches {
            tracing::warn!(click_trans_id, "Invalid Click sign_string");
            return Err(VerificationError::InvalidSignature);
        }
        Ok(())
    }

    /// Click sends amounts as decimal strings ("99000" or "99000.00").
    fn parse_amount(amount: &str) -> Result<i64, VerificationError> {
        let value: f64 = amount.parse().map_err(|_| {
            VerificationError::MalformedRequest(format!("Unparsable amount: {}", amount))
        })?;
        if value <= 0.0 || value.fract() != 0.0 || value > i64::MAX as f64 {
            return Err(VerificationError::MalformedRequest(format!(
                "Amount not expressible in whole UZS: {}",
                amount
            )));
        }
        Ok(value as i64)
    }

    fn rejection_code(rejection: &BusinessRejection) -> i64 {
        match rejection {
            BusinessRejection::AccountNotFound | BusinessRejection::SubscriptionNotPayable => {
                ERR_ACCOUNT_NOT_FOUND
            }
            BusinessRejection::AmountMismatch { .. } => ERR_INCORRECT_AMOUNT,
            BusinessRejection::UnknownTransaction => ERR_TRANSACTION_NOT_FOUND,
        }
    }

    fn error_note(code: i64) -> &'static str {
        match code {
            ERR_SUCCESS => "Success",
            ERR_SIGN_CHECK => "SIGN CHECK FAILED",
            ERR_INCORRECT_AMOUNT => "Incorrect parameter amount",
            ERR_ACCOUNT_NOT_FOUND => "Account not found",
            ERR_TRANSACTION_NOT_FOUND => "Transaction does not exist",
            ERR_TRANSACTION_CANCELLED => "Transaction cancelled",
            _ => "Request error",
        }
    }

    fn response(
        code: i64,
        click_trans_id: Option<&str>,
        merchant_trans_id: Option<&str>,
        id_field: Option<(&str, String)>,
    ) -> ProviderResponse {
        let mut body = json!({
            "error": code,
            "error_note": Self::error_note(code),
            "click_trans_id": click_trans_id,
            "merchant_trans_id": merchant_trans_id,
        });
        if let Some((key, value)) = id_field {
            body[key] = json!(value);
        }
        ProviderResponse::ok(body)
    }
}

impl PaymentAdapter for ClickAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Click
    }

    fn verify(&self, raw: &RawWebhook) -> Result<NormalizedEvent, VerificationError> {
        let click_trans_id = Self::param(raw, "click_trans_id")?;
        let service_id = Self::param(raw, "service_id")?;
        let merchant_trans_id = Self::param(raw, "merchant_trans_id")?;
        let amount = Self::param(raw, "amount")?;
        let action = Self::param(raw, "action")?;
        let sign_time = Self::param(raw, "sign_time")?;
        let merchant_prepare_id = raw.query.get("merchant_prepare_id").map(String::as_str);

        if service_id != self.service_id {
            return Err(VerificationError::MalformedRequest(
                "Unknown service_id".to_string(),
            ));
        }

        match action {
            ACTION_PREPARE => {
                self.verify_sign(
                    raw,
                    click_trans_id,
                    merchant_trans_id,
                    None,
                    amount,
                    action,
                    sign_time,
                )?;
                Ok(NormalizedEvent::Prepare {
                    external_tx_id: click_trans_id.to_string(),
                    account: merchant_trans_id.to_string(),
                    amount_uzs: Self::parse_amount(amount)?,
                    request_id: None,
                })
            }
            ACTION_COMPLETE => {
                self.verify_sign(
                    raw,
                    click_trans_id,
                    merchant_trans_id,
                    merchant_prepare_id,
                    amount,
                    action,
                    sign_time,
                )?;
                let provider_error: i64 = raw
                    .query
                    .get("error")
                    .map(|e| e.parse())
                    .transpose()
                    .map_err(|_| {
                        VerificationError::MalformedRequest("Unparsable error param".to_string())
                    })?
                    .unwrap_or(0);
                Ok(NormalizedEvent::Complete {
                    external_tx_id: click_trans_id.to_string(),
                    success: provider_error >= 0,
                    request_id: None,
                })
            }
            other => Err(VerificationError::UnknownMethod(format!("action={}", other))),
        }
    }

    fn build_response(
        &self,
        event: Option<&NormalizedEvent>,
        outcome: &ReconcileOutcome,
    ) -> ProviderResponse {
        let click_trans_id = event.and_then(NormalizedEvent::external_tx_id);
        let merchant_trans_id = match event {
            Some(NormalizedEvent::Prepare { account, .. }) => Some(account.as_str()),
            _ => None,
        };

        match outcome {
            ReconcileOutcome::Prepared(snapshot) => Self::response(
                ERR_SUCCESS,
                click_trans_id,
                merchant_trans_id,
                Some(("merchant_prepare_id", snapshot.payment_id.to_string())),
            ),
            ReconcileOutcome::Completed(snapshot) => Self::response(
                ERR_SUCCESS,
                click_trans_id,
                merchant_trans_id,
                Some(("merchant_confirm_id", snapshot.payment_id.to_string())),
            ),
            ReconcileOutcome::Cancelled(snapshot) => Self::response(
                ERR_TRANSACTION_CANCELLED,
                click_trans_id,
                merchant_trans_id,
                Some(("merchant_confirm_id", snapshot.payment_id.to_string())),
            ),
            ReconcileOutcome::Denied(VerificationError::InvalidSignature) => {
                Self::response(ERR_SIGN_CHECK, click_trans_id, merchant_trans_id, None)
            }
            ReconcileOutcome::Denied(_) => {
                Self::response(ERR_REQUEST, click_trans_id, merchant_trans_id, None)
            }
            ReconcileOutcome::Rejected(rejection) => Self::response(
                Self::rejection_code(rejection),
                click_trans_id,
                merchant_trans_id,
                None,
            ),
            ReconcileOutcome::Transient => {
                Self::response(ERR_REQUEST, click_trans_id, merchant_trans_id, None)
            }
            // Click never produces probe/inquiry outcomes.
            _ => Self::response(ERR_SUCCESS, click_trans_id, merchant_trans_id, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{PaymentSnapshot, PaymentStatus, Tariff};
    use crate::domain::foundation::{ParentId, PaymentId, Timestamp};
    use std::collections::HashMap;

    const SERVICE_ID: &str = "67890";
    const SECRET: &str = "click-test-secret";

    fn sign(
        click_trans_id: &str,
        merchant_trans_id: &str,
        merchant_prepare_id: Option<&str>,
        amount: &str,
        action: &str,
        sign_time: &str,
    ) -> String {
        let mut hasher = Md5::new();
        hasher.update(click_trans_id.as_bytes());
        hasher.update(SERVICE_ID.as_bytes());
        hasher.update(SECRET.as_bytes());
        hasher.update(merchant_trans_id.as_bytes());
        if let Some(prepare_id) = merchant_prepare_id {
            hasher.update(prepare_id.as_bytes());
        }
        hasher.update(amount.as_bytes());
        hasher.update(action.as_bytes());
        hasher.update(sign_time.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn prepare_webhook(click_trans_id: &str, merchant_trans_id: &str, amount: &str) -> RawWebhook {
        let sign_time = "2026-08-30 12:00:00";
        let mut params = HashMap::new();
        params.insert("click_trans_id".to_string(), click_trans_id.to_string());
        params.insert("service_id".to_string(), SERVICE_ID.to_string());
        params.insert("merchant_trans_id".to_string(), merchant_trans_id.to_string());
        params.insert("amount".to_string(), amount.to_string());
        params.insert("action".to_string(), "0".to_string());
        params.insert("sign_time".to_string(), sign_time.to_string());
        params.insert(
            "sign_string".to_string(),
            sign(click_trans_id, merchant_trans_id, None, amount, "0", sign_time),
        );
        RawWebhook::from_query(params)
    }

    fn complete_webhook(
        click_trans_id: &str,
        merchant_trans_id: &str,
        merchant_prepare_id: &str,
        amount: &str,
        error: i64,
    ) -> RawWebhook {
        let sign_time = "2026-08-30 12:05:00";
        let mut params = HashMap::new();
        params.insert("click_trans_id".to_string(), click_trans_id.to_string());
        params.insert("service_id".to_string(), SERVICE_ID.to_string());
        params.insert("merchant_trans_id".to_string(), merchant_trans_id.to_string());
        params.insert(
            "merchant_prepare_id".to_string(),
            merchant_prepare_id.to_string(),
        );
        params.insert("amount".to_string(), amount.to_string());
        params.insert("action".to_string(), "1".to_string());
        params.insert("error".to_string(), error.to_string());
        params.insert("sign_time".to_string(), sign_time.to_string());
        params.insert(
            "sign_string".to_string(),
            sign(
                click_trans_id,
                merchant_trans_id,
                Some(merchant_prepare_id),
                amount,
                "1",
                sign_time,
            ),
        );
        RawWebhook::from_query(params)
    }

    fn account() -> String {
        format!("{}:{}", ParentId::new(), Tariff::Monthly)
    }

    #[test]
    fn valid_prepare_normalizes() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let merchant_trans_id = account();
        let raw = prepare_webhook("click-1", &merchant_trans_id, "99000");

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Prepare {
                external_tx_id,
                account: event_account,
                amount_uzs,
                ..
            } => {
                assert_eq!(external_tx_id, "click-1");
                assert_eq!(event_account, merchant_trans_id);
                assert_eq!(amount_uzs, 99_000);
            }
            other => panic!("Expected Prepare, got {:?}", other),
        }
    }

    #[test]
    fn decimal_amount_string_is_accepted() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let raw = prepare_webhook("click-2", &account(), "99000.00");

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Prepare { amount_uzs, .. } => assert_eq!(amount_uzs, 99_000),
            other => panic!("Expected Prepare, got {:?}", other),
        }
    }

    #[test]
    fn fractional_amount_is_malformed() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let raw = prepare_webhook("click-3", &account(), "99000.50");
        assert!(matches!(
            adapter.verify(&raw),
            Err(VerificationError::MalformedRequest(_))
        ));
    }

    #[test]
    fn tampered_amount_fails_sign_check() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let mut raw = prepare_webhook("click-4", &account(), "99000");
        raw.query.insert("amount".to_string(), "1".to_string());
        assert_eq!(adapter.verify(&raw), Err(VerificationError::InvalidSignature));
    }

    #[test]
    fn wrong_service_id_is_rejected_before_sign_check() {
        let adapter = ClickAdapter::new("other-service", SECRET);
        let raw = prepare_webhook("click-5", &account(), "99000");
        assert!(matches!(
            adapter.verify(&raw),
            Err(VerificationError::MalformedRequest(_))
        ));
    }

    #[test]
    fn complete_includes_prepare_id_in_signature() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let raw = complete_webhook("click-6", &account(), "prep-1", "99000", 0);

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Complete {
                external_tx_id,
                success,
                ..
            } => {
                assert_eq!(external_tx_id, "click-6");
                assert!(success);
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn negative_error_param_means_cancelled() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let raw = complete_webhook("click-7", &account(), "prep-2", "99000", -5017);

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Complete { success, .. } => assert!(!success),
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn unknown_action_is_reported() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let mut raw = prepare_webhook("click-8", &account(), "99000");
        raw.query.insert("action".to_string(), "2".to_string());
        assert!(matches!(
            adapter.verify(&raw),
            Err(VerificationError::UnknownMethod(_))
        ));
    }

    fn snapshot() -> PaymentSnapshot {
        PaymentSnapshot {
            payment_id: PaymentId::new(),
            external_tx_id: "click-9".to_string(),
            status: PaymentStatus::Pending,
            created_at: Timestamp::now(),
            finalized_at: None,
        }
    }

    #[test]
    fn prepared_response_carries_prepare_id() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let snap = snapshot();
        let event = NormalizedEvent::Prepare {
            external_tx_id: "click-9".to_string(),
            account: account(),
            amount_uzs: 99_000,
            request_id: None,
        };

        let response =
            adapter.build_response(Some(&event), &ReconcileOutcome::Prepared(snap.clone()));
        assert_eq!(response.body["error"], json!(ERR_SUCCESS));
        assert_eq!(response.body["click_trans_id"], json!("click-9"));
        assert_eq!(
            response.body["merchant_prepare_id"],
            json!(snap.payment_id.to_string())
        );
    }

    #[test]
    fn completed_response_carries_confirm_id() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let snap = snapshot();
        let response = adapter.build_response(None, &ReconcileOutcome::Completed(snap.clone()));
        assert_eq!(response.body["error"], json!(ERR_SUCCESS));
        assert_eq!(
            response.body["merchant_confirm_id"],
            json!(snap.payment_id.to_string())
        );
    }

    #[test]
    fn cancelled_response_uses_minus_nine() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let response = adapter.build_response(None, &ReconcileOutcome::Cancelled(snapshot()));
        assert_eq!(response.body["error"], json!(ERR_TRANSACTION_CANCELLED));
    }

    #[test]
    fn rejection_codes_match_click_vocabulary() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let cases = [
            (BusinessRejection::AccountNotFound, ERR_ACCOUNT_NOT_FOUND),
            (
                BusinessRejection::SubscriptionNotPayable,
                ERR_ACCOUNT_NOT_FOUND,
            ),
            (
                BusinessRejection::AmountMismatch {
                    expected: 99_000,
                    actual: 1,
                },
                ERR_INCORRECT_AMOUNT,
            ),
            (
                BusinessRejection::UnknownTransaction,
                ERR_TRANSACTION_NOT_FOUND,
            ),
        ];
        for (rejection, expected_code) in cases {
            let response =
                adapter.build_response(None, &ReconcileOutcome::Rejected(rejection.clone()));
            assert_eq!(response.status, 200);
            assert_eq!(
                response.body["error"],
                json!(expected_code),
                "wrong code for {:?}",
                rejection
            );
        }
    }

    #[test]
    fn invalid_signature_response_uses_minus_one() {
        let adapter = ClickAdapter::new(SERVICE_ID, SECRET);
        let response = adapter.build_response(
            None,
            &ReconcileOutcome::Denied(VerificationError::InvalidSignature),
        );
        assert_eq!(response.body["error"], json!(ERR_SIGN_CHECK));
    }
}
