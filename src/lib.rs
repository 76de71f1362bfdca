//! EduBot Billing - Subscription & Payment Reconciliation Service
//!
//! This crate owns the subscription lifecycle for the EduBot parent
//! assistant: tariffs, the subscription state machine, payment-provider
//! webhook reconciliation (Stars, Payme, Click) and the periodic expiry
//! sweep. The chat transport, AI provider and report generation are
//! external collaborators reached through ports.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
