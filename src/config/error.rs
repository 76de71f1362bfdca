//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Tariff price must be positive: {0}")]
    InvalidTariffPrice(&'static str),

    #[error("Tariff duration must be positive: {0}")]
    InvalidTariffDuration(&'static str),

    #[error("Grace window must be between 1 and 30 days")]
    InvalidGraceWindow,

    #[error("Reservation TTL must be between 10 and 3600 seconds")]
    InvalidReservationTtl,

    #[error("Sweep interval must be between 60 and 86400 seconds")]
    InvalidSweepInterval,

    #[error("Ledger retention must be between 1 and 365 days")]
    InvalidLedgerRetention,

    #[error("Provider secret must not be empty: {0}")]
    EmptyProviderSecret(&'static str),
}
