//! Rate-regime generators
//!
//! A regime turns a trial seed and a horizon into the ordered per-year
//! assumptions that trial will realize. Generators know nothing about
//! financial state and must replay identically for the same seed.

mod assumptions;
mod fixed;
mod historical;
mod stochastic;
mod seed;
pub mod loader;

pub use assumptions::YearAssumptions;
pub use fixed::FixedRegime;
pub use historical::{BootstrapRegime, HistoricalRegime, HistoricalSeries, HistoricalStart};
pub use stochastic::{CorrelationMatrix, StochasticRegime, IDENTITY_CORRELATION, MIN_DRAWN_RATE};
pub use seed::{splitmix64, TrialSeeds, DEFAULT_MASTER_SEED};
pub use loader::{load_rate_series, load_rate_series_from_reader};

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoostError};

/// Source of per-year assumptions for trials
pub trait RateRegime: Send + Sync + Debug {
    /// Short label used in logs and exports
    fn name(&self) -> &'static str;

    /// Ordered assumptions for years `0..horizon`, identical for identical seeds
    fn generate(&self, trial_seed: u64, horizon: u32) -> Result<Vec<YearAssumptions>>;
}

pub(crate) fn check_horizon(horizon: u32) -> Result<()> {
    if horizon == 0 {
        return Err(RoostError::InvalidRegimeConfig("horizon must be at least one year".into()));
    }
    Ok(())
}

/// Where a historical series comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesSource {
    Csv { csv: PathBuf },
    Inline { first_year: i32, years: Vec<YearAssumptions> },
}

impl SeriesSource {
    fn load(&self) -> Result<HistoricalSeries> {
        match self {
            SeriesSource::Csv { csv } => load_rate_series(csv),
            SeriesSource::Inline { first_year, years } => {
                HistoricalSeries::new(*first_year, years.clone())
            }
        }
    }
}

/// Serializable regime selection, validated and built once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegimeConfig {
    Fixed {
        rates: YearAssumptions,
    },
    Historical {
        series: SeriesSource,
        #[serde(default)]
        start: HistoricalStart,
        #[serde(default)]
        wrap: bool,
    },
    Stochastic {
        mean: YearAssumptions,
        volatility: YearAssumptions,
        #[serde(default)]
        correlation: Option<CorrelationMatrix>,
        #[serde(default)]
        autocorrelation: f64,
    },
    Bootstrap {
        series: SeriesSource,
    },
}

impl RegimeConfig {
    /// Validate parameters and build the generator
    pub fn build(&self) -> Result<Arc<dyn RateRegime>> {
        let regime: Arc<dyn RateRegime> = match self {
            RegimeConfig::Fixed { rates } => Arc::new(FixedRegime::new(*rates)?),
            RegimeConfig::Historical { series, start, wrap } => Arc::new(HistoricalRegime::new(
                Arc::new(series.load()?),
                *start,
                *wrap,
            )?),
            RegimeConfig::Stochastic { mean, volatility, correlation, autocorrelation } => {
                Arc::new(StochasticRegime::new(*mean, *volatility, *correlation, *autocorrelation)?)
            }
            RegimeConfig::Bootstrap { series } => {
                Arc::new(BootstrapRegime::new(Arc::new(series.load()?)))
            }
        };
        log::debug!("Built {} rate regime", regime.name());
        Ok(regime)
    }
}
