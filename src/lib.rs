//! Roost Trials - annual re-optimization trial engine for retirement decision policies
//!
//! This library provides:
//! - Rate regimes (fixed, historical replay, bootstrap, correlated stochastic)
//! - An optimizer boundary that re-plans every simulated year from realized state
//! - A trial executor applying only each plan's first year against realized returns
//! - Parallel batches over trials and sweeps over policy variants
//! - Aggregation into success probabilities, percentiles and sensitivity deltas

pub mod error;
pub mod case;
pub mod choice;
pub mod regime;
pub mod longevity;
pub mod optimizer;
pub mod trial;
pub mod batch;
pub mod aggregate;
pub mod export;
pub mod plan;

// Re-export commonly used types
pub use error::{Result, RoostError};
pub use case::{Balances, Case, Objective};
pub use choice::{ChoiceTemplate, ChoiceValues, PolicyKey, Run, TrialSettings};
pub use regime::{RateRegime, RegimeConfig, YearAssumptions};
pub use optimizer::{HeuristicOptimizer, Optimizer, OptimizerAdapter};
pub use trial::{CancelToken, TrialExecutor, TrialRecord, TrialStatus};
pub use batch::{BatchConfig, BatchRunner, RunResult};
pub use aggregate::{aggregate, RunSummary, SensitivityDelta};
pub use plan::RunPlan;
