//! Trial aggregation: run summaries and cross-run sensitivity

mod stats;
mod summary;
mod compare;

pub use stats::{percentile, Distribution};
pub use summary::{aggregate, aggregate_run, OutcomeCounts, RunSummary};
pub use compare::{compare, compare_to_baseline, ParameterChange, SensitivityDelta};
