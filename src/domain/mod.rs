//! Domain layer - billing aggregates, state machines and shared value objects.

pub mod billing;
pub mod foundation;
