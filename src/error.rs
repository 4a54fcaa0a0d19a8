//! Error taxonomy for run setup, per-year optimizer calls and aggregation
//!
//! Ruin is deliberately absent: it is an expected trial outcome and lives in
//! [`crate::trial::TrialStatus::Ruined`].

use thiserror::Error;

/// Errors raised by the trial engine
#[derive(Debug, Error)]
pub enum RoostError {
    /// Bad rate-regime parameters (horizon, distribution domain, empty series)
    #[error("invalid rate regime configuration: {0}")]
    InvalidRegimeConfig(String),

    /// Case fails validation (negative balances, zero horizon, ...)
    #[error("invalid case: {0}")]
    InvalidCase(String),

    /// Choice template or its instantiated values fail validation
    #[error("invalid choice: {0}")]
    InvalidChoice(String),

    /// Solver could not satisfy the constraints for this year
    #[error("optimizer infeasible in year {year}: {reason}")]
    OptimizerInfeasible { year: u32, reason: String },

    /// Solver did not answer within the configured budget
    #[error("optimizer timed out in year {year} after {elapsed_ms} ms")]
    OptimizerTimeout { year: u32, elapsed_ms: u64 },

    /// Solver answered with a plan missing or corrupting the fields we consume
    #[error("malformed optimizer plan in year {year}: {reason}")]
    MalformedPlan { year: u32, reason: String },

    /// Trial records handed to the aggregator are incomplete or inconsistent
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Worker pool could not be built for the requested job count
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RoostError {
    /// Whether this error ends a single trial rather than a whole run
    pub fn is_trial_scoped(&self) -> bool {
        matches!(
            self,
            RoostError::OptimizerInfeasible { .. }
                | RoostError::OptimizerTimeout { .. }
                | RoostError::MalformedPlan { .. }
        )
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RoostError>;
