//! Historical replay and bootstrap resampling over an annual rate series

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{check_horizon, RateRegime, YearAssumptions};
use crate::error::{Result, RoostError};

/// Contiguous annual rate history starting at `first_year`
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    first_year: i32,
    years: Vec<YearAssumptions>,
}

impl HistoricalSeries {
    pub fn new(first_year: i32, years: Vec<YearAssumptions>) -> Result<Self> {
        if years.is_empty() {
            return Err(RoostError::InvalidRegimeConfig("historical series is empty".into()));
        }
        if let Some(offset) = years.iter().position(|y| !y.is_finite()) {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "historical series has non-finite rates in {}",
                first_year + offset as i32
            )));
        }
        if let Some(offset) = years.iter().position(|y| y.as_array().iter().any(|&r| r <= -1.0)) {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "historical series has a rate at or below -100% in {}",
                first_year + offset as i32
            )));
        }
        Ok(Self { first_year, years })
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.first_year + self.years.len() as i32 - 1
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Index of a calendar year within the series
    pub fn index_of(&self, year: i32) -> Option<usize> {
        if year < self.first_year || year > self.last_year() {
            None
        } else {
            Some((year - self.first_year) as usize)
        }
    }

    pub fn get(&self, index: usize) -> Option<&YearAssumptions> {
        self.years.get(index)
    }
}

/// Where a historical replay begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalStart {
    /// Fixed offset into the series
    Index(usize),
    /// Fixed calendar year
    Year(i32),
    /// Drawn uniformly from the valid starts using the trial seed
    #[default]
    Seeded,
}

/// Deterministic slice of a historical series
#[derive(Debug, Clone)]
pub struct HistoricalRegime {
    series: Arc<HistoricalSeries>,
    start: HistoricalStart,
    /// Continue from the beginning of the series once the end is reached
    wrap: bool,
}

impl HistoricalRegime {
    pub fn new(series: Arc<HistoricalSeries>, start: HistoricalStart, wrap: bool) -> Result<Self> {
        let start_ok = match start {
            HistoricalStart::Index(i) => i < series.len(),
            HistoricalStart::Year(y) => series.index_of(y).is_some(),
            HistoricalStart::Seeded => true,
        };
        if !start_ok {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "start {:?} outside series {}..={}",
                start,
                series.first_year(),
                series.last_year()
            )));
        }
        Ok(Self { series, start, wrap })
    }

    fn start_index(&self, trial_seed: u64, horizon: usize) -> Result<usize> {
        let len = self.series.len();
        let start = match self.start {
            HistoricalStart::Index(i) => i,
            HistoricalStart::Year(y) => self.series.index_of(y).unwrap_or(0),
            HistoricalStart::Seeded => {
                let candidates = if self.wrap {
                    len
                } else if horizon <= len {
                    len - horizon + 1
                } else {
                    0
                };
                if candidates == 0 {
                    return Err(self.too_short(horizon, 0));
                }
                ChaCha8Rng::seed_from_u64(trial_seed).gen_range(0..candidates)
            }
        };
        if !self.wrap && start + horizon > len {
            return Err(self.too_short(horizon, start));
        }
        Ok(start)
    }

    fn too_short(&self, horizon: usize, start: usize) -> RoostError {
        RoostError::InvalidRegimeConfig(format!(
            "{}-year horizon from offset {} runs past the end of the {}-year series",
            horizon,
            start,
            self.series.len()
        ))
    }
}

impl RateRegime for HistoricalRegime {
    fn name(&self) -> &'static str {
        "historical"
    }

    fn generate(&self, trial_seed: u64, horizon: u32) -> Result<Vec<YearAssumptions>> {
        check_horizon(horizon)?;
        let horizon = horizon as usize;
        let start = self.start_index(trial_seed, horizon)?;
        let len = self.series.len();
        Ok((0..horizon).map(|k| self.series.years[(start + k) % len]).collect())
    }
}

/// Independent draws of whole historical years, with replacement
#[derive(Debug, Clone)]
pub struct BootstrapRegime {
    series: Arc<HistoricalSeries>,
}

impl BootstrapRegime {
    pub fn new(series: Arc<HistoricalSeries>) -> Self {
        Self { series }
    }
}

impl RateRegime for BootstrapRegime {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    fn generate(&self, trial_seed: u64, horizon: u32) -> Result<Vec<YearAssumptions>> {
        check_horizon(horizon)?;
        let mut rng = ChaCha8Rng::seed_from_u64(trial_seed);
        let len = self.series.len();
        Ok((0..horizon)
            .map(|_| self.series.years[rng.gen_range(0..len)])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Arc<HistoricalSeries> {
        let years = (0..10)
            .map(|i| YearAssumptions::flat(i as f64 / 100.0, 0.02))
            .collect();
        Arc::new(HistoricalSeries::new(1990, years).unwrap())
    }

    #[test]
    fn test_total_loss_year_rejected() {
        let mut years = vec![YearAssumptions::default(); 3];
        years[1].inflation = -1.0;
        let err = HistoricalSeries::new(2000, years).unwrap_err();
        match err {
            RoostError::InvalidRegimeConfig(msg) => assert!(msg.contains("2001"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }

        let mut years = vec![YearAssumptions::default(); 2];
        years[0].equity = -1.3;
        assert!(HistoricalSeries::new(2000, years).is_err());
    }

    #[test]
    fn test_replay_from_year() {
        let regime = HistoricalRegime::new(series(), HistoricalStart::Year(1993), false).unwrap();
        let path = regime.generate(0, 3).unwrap();
        let equity: Vec<f64> = path.iter().map(|y| y.equity).collect();
        assert_eq!(equity, vec![0.03, 0.04, 0.05]);
    }

    #[test]
    fn test_replay_past_end_without_wrap_fails() {
        let regime = HistoricalRegime::new(series(), HistoricalStart::Index(8), false).unwrap();
        assert!(matches!(regime.generate(0, 3), Err(RoostError::InvalidRegimeConfig(_))));
    }

    #[test]
    fn test_replay_wraps() {
        let regime = HistoricalRegime::new(series(), HistoricalStart::Index(8), true).unwrap();
        let path = regime.generate(0, 4).unwrap();
        let equity: Vec<f64> = path.iter().map(|y| y.equity).collect();
        assert_eq!(equity, vec![0.08, 0.09, 0.0, 0.01]);
    }

    #[test]
    fn test_seeded_start_is_replayable_and_contiguous() {
        let regime = HistoricalRegime::new(series(), HistoricalStart::Seeded, false).unwrap();
        let a = regime.generate(77, 5).unwrap();
        assert_eq!(a, regime.generate(77, 5).unwrap());
        for pair in a.windows(2) {
            assert!((pair[1].equity - pair[0].equity - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn test_start_outside_series_rejected() {
        assert!(HistoricalRegime::new(series(), HistoricalStart::Year(1980), false).is_err());
    }

    #[test]
    fn test_bootstrap_replayable_and_seed_sensitive() {
        let regime = BootstrapRegime::new(series());
        let a = regime.generate(1, 30).unwrap();
        assert_eq!(a, regime.generate(1, 30).unwrap());
        assert_ne!(a, regime.generate(2, 30).unwrap());
        assert!(a.iter().all(|y| y.equity >= 0.0 && y.equity <= 0.09));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let regime = BootstrapRegime::new(series());
        assert!(regime.generate(1, 0).is_err());
    }
}
