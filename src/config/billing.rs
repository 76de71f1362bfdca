//! Billing configuration
//!
//! Tariff pricing, grace window and sweeper cadence. Prices default to
//! the production price list but every value can be overridden through
//! the environment so staging can run with cheap plans.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::billing::{Tariff, TariffPlan, TariffTable};

use super::error::ValidationError;

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Monthly plan duration in days
    #[serde(default = "default_monthly_days")]
    pub monthly_duration_days: i64,

    /// Monthly plan price in whole UZS
    #[serde(default = "default_monthly_price")]
    pub monthly_price_uzs: i64,

    /// Quarterly plan duration in days
    #[serde(default = "default_quarterly_days")]
    pub quarterly_duration_days: i64,

    /// Quarterly plan price in whole UZS
    #[serde(default = "default_quarterly_price")]
    pub quarterly_price_uzs: i64,

    /// Annual plan duration in days
    #[serde(default = "default_annual_days")]
    pub annual_duration_days: i64,

    /// Annual plan price in whole UZS
    #[serde(default = "default_annual_price")]
    pub annual_price_uzs: i64,

    /// Days of access after expiry before hard expiration
    #[serde(default = "default_grace_window")]
    pub grace_window_days: i64,

    /// Seconds before an abandoned webhook reservation may be retaken
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_secs: u64,

    /// Seconds between expiry sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Days a finalized webhook ledger entry is kept for replay
    #[serde(default = "default_ledger_retention")]
    pub ledger_retention_days: i64,
}

impl BillingConfig {
    /// Build the domain tariff table from the configured plans.
    pub fn tariff_table(&self) -> Result<TariffTable, ValidationError> {
        let mut plans = HashMap::new();
        plans.insert(
            Tariff::Monthly,
            TariffPlan {
                duration_days: self.monthly_duration_days,
                price_uzs: self.monthly_price_uzs,
            },
        );
        plans.insert(
            Tariff::Quarterly,
            TariffPlan {
                duration_days: self.quarterly_duration_days,
                price_uzs: self.quarterly_price_uzs,
            },
        );
        plans.insert(
            Tariff::Annual,
            TariffPlan {
                duration_days: self.annual_duration_days,
                price_uzs: self.annual_price_uzs,
            },
        );
        TariffTable::new(plans).map_err(|_| ValidationError::InvalidTariffPrice("tariffs"))
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.monthly_price_uzs <= 0 {
            return Err(ValidationError::InvalidTariffPrice("MONTHLY_PRICE_UZS"));
        }
        if self.quarterly_price_uzs <= 0 {
            return Err(ValidationError::InvalidTariffPrice("QUARTERLY_PRICE_UZS"));
        }
        if self.annual_price_uzs <= 0 {
            return Err(ValidationError::InvalidTariffPrice("ANNUAL_PRICE_UZS"));
        }
        if self.monthly_duration_days <= 0 {
            return Err(ValidationError::InvalidTariffDuration("MONTHLY_DURATION_DAYS"));
        }
        if self.quarterly_duration_days <= 0 {
            return Err(ValidationError::InvalidTariffDuration(
                "QUARTERLY_DURATION_DAYS",
            ));
        }
        if self.annual_duration_days <= 0 {
            return Err(ValidationError::InvalidTariffDuration("ANNUAL_DURATION_DAYS"));
        }
        if self.grace_window_days < 1 || self.grace_window_days > 30 {
            return Err(ValidationError::InvalidGraceWindow);
        }
        if self.reservation_ttl_secs < 10 || self.reservation_ttl_secs > 3600 {
            return Err(ValidationError::InvalidReservationTtl);
        }
        if self.sweep_interval_secs < 60 || self.sweep_interval_secs > 86_400 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        if self.ledger_retention_days < 1 || self.ledger_retention_days > 365 {
            return Err(ValidationError::InvalidLedgerRetention);
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            monthly_duration_days: default_monthly_days(),
            monthly_price_uzs: default_monthly_price(),
            quarterly_duration_days: default_quarterly_days(),
            quarterly_price_uzs: default_quarterly_price(),
            annual_duration_days: default_annual_days(),
            annual_price_uzs: default_annual_price(),
            grace_window_days: default_grace_window(),
            reservation_ttl_secs: default_reservation_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            ledger_retention_days: default_ledger_retention(),
        }
    }
}

fn default_monthly_days() -> i64 {
    30
}

fn default_monthly_price() -> i64 {
    99_000
}

fn default_quarterly_days() -> i64 {
    90
}

fn default_quarterly_price() -> i64 {
    249_000
}

fn default_annual_days() -> i64 {
    365
}

fn default_annual_price() -> i64 {
    899_000
}

fn default_grace_window() -> i64 {
    3
}

fn default_reservation_ttl() -> u64 {
    120
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_ledger_retention() -> i64 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_defaults_match_price_list() {
        let config = BillingConfig::default();
        assert_eq!(config.monthly_price_uzs, 99_000);
        assert_eq!(config.quarterly_price_uzs, 249_000);
        assert_eq!(config.annual_price_uzs, 899_000);
        assert_eq!(config.grace_window_days, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tariff_table_from_defaults() {
        let table = BillingConfig::default().tariff_table().unwrap();
        assert_eq!(table.plan(Tariff::Monthly).duration_days, 30);
        assert_eq!(table.plan(Tariff::Annual).price_uzs, 899_000);
    }

    #[test]
    fn test_validation_rejects_zero_price() {
        let config = BillingConfig {
            monthly_price_uzs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_grace_window() {
        let config = BillingConfig {
            grace_window_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BillingConfig {
            grace_window_days: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_reservation_ttl() {
        let config = BillingConfig {
            reservation_ttl_secs: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_ledger_retention() {
        let config = BillingConfig {
            ledger_retention_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
