//! Case data structures: starting balances, household, constraints

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoostError};

/// Balances per account type
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balances {
    /// Brokerage / savings account, taxed on gains
    pub taxable: f64,

    /// Traditional IRA / 401(k), taxed on withdrawal
    pub tax_deferred: f64,

    /// Roth accounts, untaxed
    pub tax_free: f64,
}

impl Balances {
    pub fn new(taxable: f64, tax_deferred: f64, tax_free: f64) -> Self {
        Self { taxable, tax_deferred, tax_free }
    }

    pub fn total(&self) -> f64 {
        self.taxable + self.tax_deferred + self.tax_free
    }

    /// Multiply every account by the same growth factor
    pub fn grown(&self, factor: f64) -> Self {
        Self {
            taxable: self.taxable * factor,
            tax_deferred: self.tax_deferred * factor,
            tax_free: self.tax_free * factor,
        }
    }

    /// Smallest single account balance
    pub fn min_account(&self) -> f64 {
        self.taxable.min(self.tax_deferred).min(self.tax_free)
    }

    pub fn is_finite(&self) -> bool {
        self.taxable.is_finite() && self.tax_deferred.is_finite() && self.tax_free.is_finite()
    }
}

/// Fraction of every account held in each asset class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub equity: f64,
    pub bonds: f64,
    pub cash: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Self { equity: 0.6, bonds: 0.4, cash: 0.0 }
    }
}

impl Allocation {
    fn validate(&self) -> Result<()> {
        for (label, weight) in [("equity", self.equity), ("bonds", self.bonds), ("cash", self.cash)] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(RoostError::InvalidCase(format!(
                    "allocation weight {} = {} outside [0, 1]",
                    label, weight
                )));
            }
        }
        let sum = self.equity + self.bonds + self.cash;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(RoostError::InvalidCase(format!("allocation weights sum to {}", sum)));
        }
        Ok(())
    }
}

/// Sex used by the longevity model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

/// Self-reported health tier used by the longevity model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Excellent,
    #[default]
    Average,
    Poor,
}

/// One member of the household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,

    /// Age at the start of the first simulated year
    pub current_age: u32,

    /// Age at which earned income stops
    pub retirement_age: u32,

    pub sex: Sex,

    #[serde(default)]
    pub health: Health,

    #[serde(default)]
    pub smoker: bool,
}

/// What the optimizer maximizes, and the value it must hold fixed to do so
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objective", rename_all = "snake_case")]
pub enum Objective {
    /// Maximize sustainable net spending, leaving at least `bequest` (today's dollars)
    MaxSpending { bequest: f64 },
    /// Maximize the after-tax bequest while spending `net_spending` per year (today's dollars)
    MaxBequest { net_spending: f64 },
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::MaxSpending { .. } => "maxSpending",
            Objective::MaxBequest { .. } => "maxBequest",
        }
    }
}

/// Hard constraints enforced on realized outcomes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Minimum net spending per year in today's dollars
    pub spending_floor: f64,

    /// Income tax rate heirs pay on inherited tax-deferred balances
    #[serde(default)]
    pub heirs_tax_rate: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self { spending_floor: 0.0, heirs_tax_rate: 0.0 }
    }
}

/// Immutable starting conditions for a scenario
///
/// Shared by `Arc` across every run and trial derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: String,

    /// Calendar year of the first simulated year
    pub start_year: i32,

    /// One or two people
    pub people: Vec<Person>,

    #[serde(default)]
    pub married: bool,

    pub balances: Balances,

    #[serde(default)]
    pub allocation: Allocation,

    /// Planning horizon in years (>= 1)
    pub horizon_years: u32,

    #[serde(default)]
    pub constraints: Constraints,

    pub objective: Objective,
}

impl Case {
    /// Check every invariant a run relies on
    pub fn validate(&self) -> Result<()> {
        if self.people.is_empty() || self.people.len() > 2 {
            return Err(RoostError::InvalidCase(format!(
                "case '{}' must describe one or two people, found {}",
                self.name,
                self.people.len()
            )));
        }
        if self.horizon_years == 0 {
            return Err(RoostError::InvalidCase(format!(
                "case '{}' has a zero-year horizon",
                self.name
            )));
        }
        if !self.balances.is_finite() || self.balances.min_account() < 0.0 {
            return Err(RoostError::InvalidCase(format!(
                "case '{}' has negative or non-finite starting balances",
                self.name
            )));
        }
        self.allocation.validate()?;

        let floor = self.constraints.spending_floor;
        if !floor.is_finite() || floor < 0.0 {
            return Err(RoostError::InvalidCase(format!("spending floor {} is invalid", floor)));
        }
        if !(0.0..=1.0).contains(&self.constraints.heirs_tax_rate) {
            return Err(RoostError::InvalidCase(format!(
                "heirs tax rate {} outside [0, 1]",
                self.constraints.heirs_tax_rate
            )));
        }

        let target = match self.objective {
            Objective::MaxSpending { bequest } => bequest,
            Objective::MaxBequest { net_spending } => net_spending,
        };
        if !target.is_finite() || target < 0.0 {
            return Err(RoostError::InvalidCase(format!(
                "objective {} target {} is invalid",
                self.objective.as_str(),
                target
            )));
        }
        Ok(())
    }

    /// Ages of every person at the start of the first simulated year
    pub fn starting_ages(&self) -> Vec<u32> {
        self.people.iter().map(|p| p.current_age).collect()
    }
}
