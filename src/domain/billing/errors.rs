//! Error taxonomy for webhook verification and reconciliation.
//!
//! Adapters and the orchestrator surface these as typed outcomes, never
//! raw exceptions. Each provider adapter maps them to its own response
//! vocabulary; internal error text is never forwarded to a provider.

use thiserror::Error;

/// Request authenticity or shape failures. Always a permanent rejection
/// and never touches persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Signature or credential check failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Request could not be parsed into the provider's expected shape.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Two-phase request named a method/action we do not implement.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

/// Definite business rejections. Permanent: the provider should not
/// retry the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessRejection {
    /// The account reference does not resolve to a known parent.
    #[error("Account not found")]
    AccountNotFound,

    /// The referenced subscription cannot accept a payment.
    #[error("Subscription not payable")]
    SubscriptionNotPayable,

    /// Paid amount does not match the tariff price.
    #[error("Amount mismatch: expected {expected} UZS, got {actual} UZS")]
    AmountMismatch { expected: i64, actual: i64 },

    /// Complete phase referenced a transaction we never prepared.
    #[error("Unknown transaction")]
    UnknownTransaction,
}
