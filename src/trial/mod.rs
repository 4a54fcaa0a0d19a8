//! One stochastic trial of a run, from initial state to terminal status

mod state;
mod record;
mod cancel;
mod engine;

pub use state::{Realized, TrialState, OVERDRAW_TOLERANCE};
pub use record::{FailureKind, RuinReason, TrialMetrics, TrialRecord, TrialStatus, YearRecord};
pub use cancel::CancelToken;
pub use engine::{TrialExecutor, TrialPhase};
