//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing core to the outside world:
//! - `providers` - Payment provider webhook verification and responses
//! - `http` - Axum webhook routes
//! - `postgres` - PostgreSQL-backed persistence
//! - `memory` - In-memory implementations for tests and local runs

pub mod http;
pub mod memory;
pub mod postgres;
pub mod providers;
