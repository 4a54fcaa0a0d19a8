//! Constant-rate regime

use super::{check_horizon, RateRegime, YearAssumptions};
use crate::error::{Result, RoostError};

/// Same rates every year and every trial
#[derive(Debug, Clone)]
pub struct FixedRegime {
    rates: YearAssumptions,
}

impl FixedRegime {
    pub fn new(rates: YearAssumptions) -> Result<Self> {
        if !rates.is_finite() || rates.as_array().iter().any(|&r| r <= -1.0) {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "fixed rates must be finite and above -100%: {:?}",
                rates
            )));
        }
        Ok(Self { rates })
    }
}

impl RateRegime for FixedRegime {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn generate(&self, _trial_seed: u64, horizon: u32) -> Result<Vec<YearAssumptions>> {
        check_horizon(horizon)?;
        Ok(vec![self.rates; horizon as usize])
    }
}
