//! Optimizer boundary
//!
//! The optimizer itself is external: a pure function from one year's realized
//! state and assumptions to an optimal multi-year plan. This module defines
//! the shapes crossing that boundary, the [`OptimizerAdapter`] the trial loop
//! talks to, and a [`HeuristicOptimizer`] used when no real solver is wired in.

mod schema;
mod adapter;
mod heuristic;

pub use schema::{Decision, OptimizerPlan, OptimizerRequest, PlanYear};
pub use adapter::{Advice, OptimizerAdapter};
pub use heuristic::HeuristicOptimizer;

use std::fmt::Debug;

use thiserror::Error;

/// Failure reported by the solver itself
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SolverFailure(pub String);

impl SolverFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// External single-scenario optimizer
///
/// Implementations must be pure with respect to the request: the same request
/// always yields the same plan, and no state is kept between calls.
pub trait Optimizer: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn solve(&self, request: &OptimizerRequest) -> Result<OptimizerPlan, SolverFailure>;
}
