//! Policy parameter keys and the resolved policy a run executes

use serde::{Deserialize, Serialize};

use crate::case::Objective;

/// Named policy parameters a choice template may vary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKey {
    /// Fraction of the tax-deferred balance above the threshold converted to Roth each year
    ConversionRate,
    /// Tax-deferred balance (today's dollars) below which nothing is converted
    ConversionThreshold,
    /// Cap on a single year's Roth conversion (today's dollars)
    MaxConversion,
    /// Policy spending floor (today's dollars); never below the case floor
    SpendingFloor,
    /// Bequest target for the max-spending objective (today's dollars)
    BequestTarget,
    /// Net spending target for the max-bequest objective (today's dollars)
    SpendingTarget,
}

impl PolicyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKey::ConversionRate => "conversion_rate",
            PolicyKey::ConversionThreshold => "conversion_threshold",
            PolicyKey::MaxConversion => "max_conversion",
            PolicyKey::SpendingFloor => "spending_floor",
            PolicyKey::BequestTarget => "bequest_target",
            PolicyKey::SpendingTarget => "spending_target",
        }
    }

    /// Values the key can ever take, independent of any template
    pub fn admissible(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            PolicyKey::ConversionRate => (0.0..=1.0).contains(&value),
            _ => value >= 0.0,
        }
    }
}

/// Fully resolved decision policy, forwarded to the optimizer every year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyParams {
    pub conversion_rate: f64,
    pub conversion_threshold: f64,
    pub max_conversion: Option<f64>,
    /// Effective floor: max of the case floor and the policy floor
    pub spending_floor: f64,
    pub objective: Objective,
}

impl PolicyParams {
    /// Roth conversion the policy asks for, in nominal dollars
    ///
    /// `price_index` converts the today's-dollar threshold and cap.
    pub fn requested_conversion(&self, tax_deferred: f64, price_index: f64) -> f64 {
        let excess = (tax_deferred - self.conversion_threshold * price_index).max(0.0);
        let wanted = excess * self.conversion_rate;
        match self.max_conversion {
            Some(cap) => wanted.min(cap * price_index),
            None => wanted,
        }
    }
}
