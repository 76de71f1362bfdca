//! Tariff catalogue - durations and prices for subscription plans.
//!
//! The recognized tariffs are fixed (monthly / quarterly / annual) but
//! their durations and prices come from configuration so pricing changes
//! never require a code change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tariff {
    Monthly,
    Quarterly,
    Annual,
}

impl Tariff {
    /// All recognized tariffs, cheapest first.
    pub fn all() -> [Tariff; 3] {
        [Tariff::Monthly, Tariff::Quarterly, Tariff::Annual]
    }

    /// Stable wire/storage code for this tariff.
    pub fn code(&self) -> &'static str {
        match self {
            Tariff::Monthly => "monthly",
            Tariff::Quarterly => "quarterly",
            Tariff::Annual => "annual",
        }
    }
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Tariff {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Tariff::Monthly),
            "quarterly" => Ok(Tariff::Quarterly),
            "annual" => Ok(Tariff::Annual),
            other => Err(ValidationError::invalid_format(
                "tariff",
                format!("Unknown tariff code: {}", other),
            )),
        }
    }
}

/// Duration and price of one tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffPlan {
    /// Subscription period length in days.
    pub duration_days: i64,

    /// Price in whole UZS.
    pub price_uzs: i64,
}

/// Lookup table mapping each tariff to its plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffTable {
    plans: HashMap<Tariff, TariffPlan>,
}

impl TariffTable {
    /// Builds a table from explicit plans.
    ///
    /// # Errors
    ///
    /// Fails if a plan has a non-positive duration or price, or if a
    /// recognized tariff is missing from the map.
    pub fn new(plans: HashMap<Tariff, TariffPlan>) -> Result<Self, ValidationError> {
        for tariff in Tariff::all() {
            let plan = plans.get(&tariff).ok_or_else(|| {
                ValidationError::invalid_format(
                    "tariffs",
                    format!("Missing plan for tariff '{}'", tariff),
                )
            })?;
            if plan.duration_days <= 0 {
                return Err(ValidationError::not_positive(
                    "duration_days",
                    plan.duration_days,
                ));
            }
            if plan.price_uzs <= 0 {
                return Err(ValidationError::not_positive("price_uzs", plan.price_uzs));
            }
        }
        Ok(Self { plans })
    }

    /// Production pricing: 30 d / 99 000, 90 d / 249 000, 365 d / 899 000 UZS.
    pub fn production_defaults() -> Self {
        let mut plans = HashMap::new();
        plans.insert(
            Tariff::Monthly,
            TariffPlan {
                duration_days: 30,
                price_uzs: 99_000,
            },
        );
        plans.insert(
            Tariff::Quarterly,
            TariffPlan {
                duration_days: 90,
                price_uzs: 249_000,
            },
        );
        plans.insert(
            Tariff::Annual,
            TariffPlan {
                duration_days: 365,
                price_uzs: 899_000,
            },
        );
        Self { plans }
    }

    /// Returns the plan for a tariff.
    pub fn plan(&self, tariff: Tariff) -> TariffPlan {
        // new() guarantees every recognized tariff has a plan
        self.plans[&tariff]
    }

    /// Checks a paid amount against a tariff's price.
    ///
    /// Matching is exact: the provider-declared amount must equal the
    /// configured price to the UZS.
    pub fn amount_matches(&self, tariff: Tariff, amount_uzs: i64) -> bool {
        self.plan(tariff).price_uzs == amount_uzs
    }

    /// Resolves a tariff from an exact price, for single-phase providers
    /// whose request carries only an amount.
    ///
    /// Returns `None` when no tariff is priced at that amount; the
    /// payment is then rejected rather than booked at a nearby tariff.
    pub fn tariff_for_amount(&self, amount_uzs: i64) -> Option<Tariff> {
        Tariff::all()
            .into_iter()
            .find(|tariff| self.plan(*tariff).price_uzs == amount_uzs)
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::production_defaults()
    }
}
