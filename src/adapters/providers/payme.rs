//! Payme merchant API adapter (JSON-RPC 2.0 two-phase).
//!
//! Payme POSTs JSON-RPC calls to a single endpoint; the five merchant
//! methods map onto the normalized event set: `CheckPerformTransaction`
//! probes payability, `CreateTransaction` prepares, `PerformTransaction`
//! and `CancelTransaction` complete, `CheckTransaction` inquires.
//!
//! Amounts on the wire are in tiyin (UZS x 100) and are converted to
//! whole UZS at the boundary.
//!
//! # Security
//!
//! - HTTP Basic credential `Paycom:{secret}` compared constant-time
//! - Every response is HTTP 200; failures travel in the JSON-RPC
//!   `error` object with Payme's numeric codes and generic messages

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::domain::billing::{
    BusinessRejection, NormalizedEvent, PaymentProvider, PaymentSnapshot, PaymentStatus,
    ProviderResponse, ReconcileOutcome, VerificationError,
};
use crate::ports::{PaymentAdapter, RawWebhook};

// Payme merchant API error vocabulary.
const ERR_INSUFFICIENT_PRIVILEGE: i64 = -32504;
const ERR_PARSE: i64 = -32700;
const ERR_METHOD_NOT_FOUND: i64 = -32601;
const ERR_WRONG_AMOUNT: i64 = -31001;
const ERR_ACCOUNT_NOT_FOUND: i64 = -31050;
const ERR_ACCOUNT_NOT_PAYABLE: i64 = -31051;
const ERR_TRANSACTION_NOT_FOUND: i64 = -31003;
const ERR_COULD_NOT_PERFORM: i64 = -31008;

// Payme transaction states.
const STATE_CREATED: i64 = 1;
const STATE_PERFORMED: i64 = 2;
const STATE_CANCELLED: i64 = -1;

/// Inbound JSON-RPC envelope.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Payme merchant API adapter.
pub struct PaymeAdapter {
    secret_key: SecretString,
}

impl PaymeAdapter {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::new(secret_key.into()),
        }
    }

    /// Check the Basic auth header against `Paycom:{secret}`.
    ///
    /// Constant-time comparison over the decoded credential.
    fn verify_auth(&self, auth_header: Option<&str>) -> Result<(), VerificationError> {
        let header = auth_header.ok_or(VerificationError::InvalidSignature)?;
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or(VerificationError::InvalidSignature)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| VerificationError::InvalidSignature)?;

        let expected = format!("Paycom:{}", self.secret_key.expose_secret());
        if decoded.ct_eq(expected.as_bytes()).unwrap_u8() != 1 {
            tracing::warn!("Payme request with invalid merchant credentials");
            return Err(VerificationError::InvalidSignature);
        }
        Ok(())
    }

    /// Convert a tiyin amount to whole UZS.
    fn tiyin_to_uzs(amount: i64) -> Result<i64, VerificationError> {
        if amount <= 0 || amount % 100 != 0 {
            return Err(VerificationError::MalformedRequest(format!(
                "Amount not expressible in whole UZS: {}",
                amount
            )));
        }
        Ok(amount / 100)
    }

    fn str_param(params: &Value, key: &str) -> Result<String, VerificationError> {
        params
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                VerificationError::MalformedRequest(format!("Missing param: {}", key))
            })
    }

    fn amount_param(params: &Value) -> Result<i64, VerificationError> {
        let tiyin = params.get("amount").and_then(Value::as_i64).ok_or_else(|| {
            VerificationError::MalformedRequest("Missing param: amount".to_string())
        })?;
        Self::tiyin_to_uzs(tiyin)
    }

    /// The account object carries the checkout order reference.
    fn account_param(params: &Value) -> Result<String, VerificationError> {
        params
            .get("account")
            .and_then(|account| account.get("order_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                VerificationError::MalformedRequest("Missing param: account.order_id".to_string())
            })
    }

    fn rpc_result(id: Option<&Value>, result: Value) -> ProviderResponse {
        ProviderResponse::ok(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
    }

    fn rpc_error(id: Option<&Value>, code: i64, message: &str) -> ProviderResponse {
        ProviderResponse::ok(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        }))
    }

    fn state_of(snapshot: &PaymentSnapshot) -> i64 {
        match snapshot.status {
            PaymentStatus::Pending => STATE_CREATED,
            PaymentStatus::Success => STATE_PERFORMED,
            PaymentStatus::Failed => STATE_CANCELLED,
        }
    }

    fn rejection_error(id: Option<&Value>, rejection: &BusinessRejection) -> ProviderResponse {
        match rejection {
            BusinessRejection::AccountNotFound => {
                Self::rpc_error(id, ERR_ACCOUNT_NOT_FOUND, "Account not found")
            }
            BusinessRejection::SubscriptionNotPayable => {
                Self::rpc_error(id, ERR_ACCOUNT_NOT_PAYABLE, "Account not payable")
            }
            BusinessRejection::AmountMismatch { .. } => {
                Self::rpc_error(id, ERR_WRONG_AMOUNT, "Wrong amount")
            }
            BusinessRejection::UnknownTransaction => {
                Self::rpc_error(id, ERR_TRANSACTION_NOT_FOUND, "Transaction not found")
            }
        }
    }
}

impl PaymentAdapter for PaymeAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Payme
    }

    fn verify(&self, raw: &RawWebhook) -> Result<NormalizedEvent, VerificationError> {
        self.verify_auth(raw.auth_header.as_deref())?;

        let request: RpcRequest = serde_json::from_slice(&raw.body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Payme JSON-RPC request");
            VerificationError::MalformedRequest(format!("Invalid JSON-RPC: {}", e))
        })?;

        let request_id = request.id.clone();
        let params = &request.params;

        match request.method.as_str() {
            "CheckPerformTransaction" => Ok(NormalizedEvent::Probe {
                account: Self::account_param(params)?,
                amount_uzs: Self::amount_param(params)?,
                request_id,
            }),
            "CreateTransaction" => Ok(NormalizedEvent::Prepare {
                external_tx_id: Self::str_param(params, "id")?,
                account: Self::account_param(params)?,
                amount_uzs: Self::amount_param(params)?,
                request_id,
            }),
            "PerformTransaction" => Ok(NormalizedEvent::Complete {
                external_tx_id: Self::str_param(params, "id")?,
                success: true,
                request_id,
            }),
            "CancelTransaction" => Ok(NormalizedEvent::Complete {
                external_tx_id: Self::str_param(params, "id")?,
                success: false,
                request_id,
            }),
            "CheckTransaction" => Ok(NormalizedEvent::Inquiry {
                external_tx_id: Self::str_param(params, "id")?,
                request_id,
            }),
            other => Err(VerificationError::UnknownMethod(other.to_string())),
        }
    }

    fn build_response(
        &self,
        event: Option<&NormalizedEvent>,
        outcome: &ReconcileOutcome,
    ) -> ProviderResponse {
        let request_id = match event {
            Some(
                NormalizedEvent::Probe { request_id, .. }
                | NormalizedEvent::Prepare { request_id, .. }
                | NormalizedEvent::Complete { request_id, .. }
                | NormalizedEvent::Inquiry { request_id, .. },
            ) => request_id.as_ref(),
            _ => None,
        };

        match outcome {
            ReconcileOutcome::Allowed => Self::rpc_result(request_id, json!({"allow": true})),
            ReconcileOutcome::Prepared(snapshot) => Self::rpc_result(
                request_id,
                json!({
                    "create_time": snapshot.created_at.as_unix_millis(),
                    "transaction": snapshot.payment_id.to_string(),
                    "state": STATE_CREATED,
                }),
            ),
            ReconcileOutcome::Completed(snapshot) => Self::rpc_result(
                request_id,
                json!({
                    "transaction": snapshot.payment_id.to_string(),
                    "perform_time": snapshot
                        .finalized_at
                        .map(|t| t.as_unix_millis())
                        .unwrap_or(0),
                    "state": STATE_PERFORMED,
                }),
            ),
            ReconcileOutcome::Cancelled(snapshot) => Self::rpc_result(
                request_id,
                json!({
                    "transaction": snapshot.payment_id.to_string(),
                    "cancel_time": snapshot
                        .finalized_at
                        .map(|t| t.as_unix_millis())
                        .unwrap_or(0),
                    "state": STATE_CANCELLED,
                }),
            ),
            ReconcileOutcome::State(snapshot) => {
                let state = Self::state_of(snapshot);
                Self::rpc_result(
                    request_id,
                    json!({
                        "create_time": snapshot.created_at.as_unix_millis(),
                        "perform_time": (snapshot.status == PaymentStatus::Success)
                            .then(|| snapshot.finalized_at.map(|t| t.as_unix_millis()))
                            .flatten()
                            .unwrap_or(0),
                        "cancel_time": (snapshot.status == PaymentStatus::Failed)
                            .then(|| snapshot.finalized_at.map(|t| t.as_unix_millis()))
                            .flatten()
                            .unwrap_or(0),
                        "transaction": snapshot.payment_id.to_string(),
                        "state": state,
                        "reason": Value::Null,
                    }),
                )
            }
            ReconcileOutcome::Denied(VerificationError::InvalidSignature) => {
                Self::rpc_error(request_id, ERR_INSUFFICIENT_PRIVILEGE, "Insufficient privilege")
            }
            ReconcileOutcome::Denied(VerificationError::UnknownMethod(_)) => {
                Self::rpc_error(request_id, ERR_METHOD_NOT_FOUND, "Method not found")
            }
            ReconcileOutcome::Denied(VerificationError::MalformedRequest(_)) => {
                Self::rpc_error(request_id, ERR_PARSE, "Parse error")
            }
            ReconcileOutcome::Rejected(rejection) => Self::rejection_error(request_id, rejection),
            ReconcileOutcome::Transient => {
                Self::rpc_error(request_id, ERR_COULD_NOT_PERFORM, "Could not perform operation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Tariff;
    use crate::domain::foundation::{ParentId, PaymentId, Timestamp};

    const SECRET: &str = "payme-test-secret";

    fn auth_header(secret: &str) -> String {
        let credential = format!("Paycom:{}", secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credential)
        )
    }

    fn rpc_webhook(method: &str, params: Value) -> RawWebhook {
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": method,
            "params": params,
        }))
        .unwrap();
        RawWebhook::from_body(body).with_auth(auth_header(SECRET))
    }

    fn order_id() -> String {
        format!("{}:{}", ParentId::new(), Tariff::Monthly)
    }

    #[test]
    fn missing_auth_is_denied() {
        let adapter = PaymeAdapter::new(SECRET);
        let raw = RawWebhook::from_body(b"{}".to_vec());
        assert_eq!(adapter.verify(&raw), Err(VerificationError::InvalidSignature));
    }

    #[test]
    fn wrong_secret_is_denied() {
        let adapter = PaymeAdapter::new(SECRET);
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0", "id": 1,
            "method": "CheckPerformTransaction",
            "params": {"amount": 9_900_000, "account": {"order_id": order_id()}},
        }))
        .unwrap();
        let raw = RawWebhook::from_body(body).with_auth(auth_header("other"));
        assert_eq!(adapter.verify(&raw), Err(VerificationError::InvalidSignature));
    }

    #[test]
    fn check_perform_normalizes_to_probe_in_uzs() {
        let adapter = PaymeAdapter::new(SECRET);
        let account = order_id();
        let raw = rpc_webhook(
            "CheckPerformTransaction",
            json!({"amount": 9_900_000, "account": {"order_id": account}}),
        );

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Probe {
                account: event_account,
                amount_uzs,
                request_id,
            } => {
                assert_eq!(event_account, account);
                assert_eq!(amount_uzs, 99_000);
                assert_eq!(request_id, Some(json!(7)));
            }
            other => panic!("Expected Probe, got {:?}", other),
        }
    }

    #[test]
    fn create_transaction_normalizes_to_prepare() {
        let adapter = PaymeAdapter::new(SECRET);
        let account = order_id();
        let raw = rpc_webhook(
            "CreateTransaction",
            json!({
                "id": "payme-tx-1",
                "time": 1_700_000_000_000i64,
                "amount": 24_900_000,
                "account": {"order_id": account},
            }),
        );

        match adapter.verify(&raw).unwrap() {
            NormalizedEvent::Prepare {
                external_tx_id,
                account: event_account,
                amount_uzs,
                ..
            } => {
                assert_eq!(external_tx_id, "payme-tx-1");
                assert_eq!(event_account, account);
                assert_eq!(amount_uzs, 249_000);
            }
            other => panic!("Expected Prepare, got {:?}", other),
        }
    }

    #[test]
    fn perform_and_cancel_normalize_to_complete() {
        let adapter = PaymeAdapter::new(SECRET);

        let perform = adapter
            .verify(&rpc_webhook("PerformTransaction", json!({"id": "payme-tx-2"})))
            .unwrap();
        assert!(matches!(
            perform,
            NormalizedEvent::Complete { success: true, .. }
        ));

        let cancel = adapter
            .verify(&rpc_webhook(
                "CancelTransaction",
                json!({"id": "payme-tx-2", "reason": 3}),
            ))
            .unwrap();
        assert!(matches!(
            cancel,
            NormalizedEvent::Complete { success: false, .. }
        ));
    }

    #[test]
    fn check_transaction_normalizes_to_inquiry() {
        let adapter = PaymeAdapter::new(SECRET);
        let event = adapter
            .verify(&rpc_webhook("CheckTransaction", json!({"id": "payme-tx-3"})))
            .unwrap();
        assert!(matches!(event, NormalizedEvent::Inquiry { .. }));
    }

    #[test]
    fn unknown_method_is_reported_as_such() {
        let adapter = PaymeAdapter::new(SECRET);
        let result = adapter.verify(&rpc_webhook("GetStatement", json!({})));
        assert_eq!(
            result,
            Err(VerificationError::UnknownMethod("GetStatement".to_string()))
        );
    }

    #[test]
    fn fractional_tiyin_amount_is_malformed() {
        let adapter = PaymeAdapter::new(SECRET);
        let result = adapter.verify(&rpc_webhook(
            "CheckPerformTransaction",
            json!({"amount": 9_900_050, "account": {"order_id": order_id()}}),
        ));
        assert!(matches!(
            result,
            Err(VerificationError::MalformedRequest(_))
        ));
    }

    fn snapshot(status: PaymentStatus) -> PaymentSnapshot {
        let now = Timestamp::now();
        PaymentSnapshot {
            payment_id: PaymentId::new(),
            external_tx_id: "payme-tx-9".to_string(),
            status,
            created_at: now,
            finalized_at: (status != PaymentStatus::Pending).then_some(now),
        }
    }

    fn probe_event() -> NormalizedEvent {
        NormalizedEvent::Probe {
            account: order_id(),
            amount_uzs: 99_000,
            request_id: Some(json!(42)),
        }
    }

    #[test]
    fn allow_response_echoes_request_id() {
        let adapter = PaymeAdapter::new(SECRET);
        let response = adapter.build_response(Some(&probe_event()), &ReconcileOutcome::Allowed);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["id"], json!(42));
        assert_eq!(response.body["result"]["allow"], json!(true));
    }

    #[test]
    fn prepared_response_carries_state_one() {
        let adapter = PaymeAdapter::new(SECRET);
        let snap = snapshot(PaymentStatus::Pending);
        let response =
            adapter.build_response(None, &ReconcileOutcome::Prepared(snap.clone()));
        assert_eq!(response.body["result"]["state"], json!(STATE_CREATED));
        assert_eq!(
            response.body["result"]["transaction"],
            json!(snap.payment_id.to_string())
        );
        assert_eq!(
            response.body["result"]["create_time"],
            json!(snap.created_at.as_unix_millis())
        );
    }

    #[test]
    fn completed_response_carries_state_two() {
        let adapter = PaymeAdapter::new(SECRET);
        let response =
            adapter.build_response(None, &ReconcileOutcome::Completed(snapshot(PaymentStatus::Success)));
        assert_eq!(response.body["result"]["state"], json!(STATE_PERFORMED));
        assert!(response.body["result"]["perform_time"].as_i64().unwrap() > 0);
    }

    #[test]
    fn cancelled_response_carries_negative_state() {
        let adapter = PaymeAdapter::new(SECRET);
        let response =
            adapter.build_response(None, &ReconcileOutcome::Cancelled(snapshot(PaymentStatus::Failed)));
        assert_eq!(response.body["result"]["state"], json!(STATE_CANCELLED));
    }

    #[test]
    fn error_codes_match_payme_vocabulary() {
        let adapter = PaymeAdapter::new(SECRET);

        let cases = [
            (
                ReconcileOutcome::Denied(VerificationError::InvalidSignature),
                ERR_INSUFFICIENT_PRIVILEGE,
            ),
            (
                ReconcileOutcome::Denied(VerificationError::UnknownMethod("X".into())),
                ERR_METHOD_NOT_FOUND,
            ),
            (
                ReconcileOutcome::Denied(VerificationError::MalformedRequest("bad".into())),
                ERR_PARSE,
            ),
            (
                ReconcileOutcome::Rejected(BusinessRejection::AccountNotFound),
                ERR_ACCOUNT_NOT_FOUND,
            ),
            (
                ReconcileOutcome::Rejected(BusinessRejection::SubscriptionNotPayable),
                ERR_ACCOUNT_NOT_PAYABLE,
            ),
            (
                ReconcileOutcome::Rejected(BusinessRejection::AmountMismatch {
                    expected: 99_000,
                    actual: 1,
                }),
                ERR_WRONG_AMOUNT,
            ),
            (
                ReconcileOutcome::Rejected(BusinessRejection::UnknownTransaction),
                ERR_TRANSACTION_NOT_FOUND,
            ),
            (ReconcileOutcome::Transient, ERR_COULD_NOT_PERFORM),
        ];

        for (outcome, expected_code) in cases {
            let response = adapter.build_response(None, &outcome);
            assert_eq!(response.status, 200, "JSON-RPC errors stay HTTP 200");
            assert_eq!(
                response.body["error"]["code"],
                json!(expected_code),
                "wrong code for {:?}",
                outcome
            );
        }
    }

    #[test]
    fn error_messages_are_generic() {
        let adapter = PaymeAdapter::new(SECRET);
        let response = adapter.build_response(
            None,
            &ReconcileOutcome::Denied(VerificationError::MalformedRequest(
                "internal detail xyz".to_string(),
            )),
        );
        let message = response.body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("xyz"));
    }
}
