//! Realized market and inflation rates for one simulated year

use serde::{Deserialize, Serialize};

use crate::case::Allocation;

/// Annual rates for one year, as decimals (0.07 = 7%)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YearAssumptions {
    /// Total return on equities
    pub equity: f64,
    /// Total return on bonds
    pub bonds: f64,
    /// Return on cash / T-bills
    pub cash: f64,
    /// Consumer price inflation
    pub inflation: f64,
}

impl YearAssumptions {
    pub fn new(equity: f64, bonds: f64, cash: f64, inflation: f64) -> Self {
        Self { equity, bonds, cash, inflation }
    }

    /// Constant rates for every asset class
    pub fn flat(rate: f64, inflation: f64) -> Self {
        Self::new(rate, rate, rate, inflation)
    }

    /// Allocation-weighted nominal portfolio return
    pub fn portfolio_return(&self, allocation: &Allocation) -> f64 {
        allocation.equity * self.equity + allocation.bonds * self.bonds + allocation.cash * self.cash
    }

    /// Allocation-weighted real portfolio return
    pub fn real_portfolio_return(&self, allocation: &Allocation) -> f64 {
        (1.0 + self.portfolio_return(allocation)) / (1.0 + self.inflation) - 1.0
    }

    pub(crate) fn as_array(&self) -> [f64; 4] {
        [self.equity, self.bonds, self.cash, self.inflation]
    }

    pub(crate) fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}
