//! Batch runner: parallel trials per run, sequential runs per sweep
//!
//! Trials of one run share nothing mutable (the run is read through `&Run`,
//! every trial owns its state) and fan out over rayon workers. Years inside a
//! trial stay sequential.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate_run, RunSummary};
use crate::choice::{Run, TrialSettings};
use crate::error::{Result, RoostError};
use crate::optimizer::{Optimizer, OptimizerAdapter};
use crate::regime::DEFAULT_MASTER_SEED;
use crate::trial::{CancelToken, TrialExecutor, TrialRecord};

fn default_master_seed() -> u64 {
    DEFAULT_MASTER_SEED
}

fn default_trials() -> u32 {
    100
}

/// Batch execution settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_trials")]
    pub trials: u32,

    #[serde(default = "default_master_seed")]
    pub master_seed: u64,

    /// Worker threads; rayon's global pool when unset
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Wall-clock budget per optimizer call
    #[serde(default)]
    pub optimizer_timeout_ms: Option<u64>,

    #[serde(default)]
    pub sample_longevity: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            master_seed: DEFAULT_MASTER_SEED,
            jobs: None,
            optimizer_timeout_ms: None,
            sample_longevity: false,
        }
    }
}

impl BatchConfig {
    pub fn trial_settings(&self) -> TrialSettings {
        TrialSettings {
            trials: self.trials,
            master_seed: self.master_seed,
            sample_longevity: self.sample_longevity,
        }
    }

    pub fn optimizer_timeout(&self) -> Option<Duration> {
        self.optimizer_timeout_ms.map(Duration::from_millis)
    }
}

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct RunResult {
    pub summary: RunSummary,
    /// Ordered by trial id
    pub trials: Vec<TrialRecord>,
}

/// Executes runs against one optimizer
pub struct BatchRunner {
    executor: TrialExecutor,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
}

impl BatchRunner {
    pub fn new(optimizer: Arc<dyn Optimizer>, config: &BatchConfig) -> Result<Self> {
        let mut adapter = OptimizerAdapter::new(optimizer);
        if let Some(timeout) = config.optimizer_timeout() {
            adapter = adapter.with_timeout(timeout);
        }
        let pool = match config.jobs {
            Some(jobs) => Some(rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?),
            None => None,
        };
        Ok(Self {
            executor: TrialExecutor::new(adapter),
            pool,
            cancel: CancelToken::new(),
        })
    }

    /// Handle for stopping outstanding trials at their next year boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn executor(&self) -> &TrialExecutor {
        &self.executor
    }

    /// Run every trial of `run`
    ///
    /// Trial failures are recorded in the returned records; an `Err` means the
    /// run could not start.
    pub fn run_trials(&self, run: &Run) -> Result<Vec<TrialRecord>> {
        // Surface regime problems before any trial is spent on them
        let probe = run.regime.generate(run.trial_seeds(0).rates, run.case.horizon_years)?;
        if probe.len() != run.case.horizon_years as usize {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "{} regime cannot cover a {}-year horizon",
                run.regime.name(),
                run.case.horizon_years
            )));
        }

        let start = Instant::now();
        let adapter = self.executor.adapter();
        log::info!(
            "Running {} trials of {} with {} optimizer (budget {})",
            run.settings.trials,
            run.label,
            adapter.optimizer_name(),
            adapter
                .timeout()
                .map(|t| format!("{} ms", t.as_millis()))
                .unwrap_or_else(|| "none".to_string())
        );

        let execute = || {
            (0..run.settings.trials)
                .into_par_iter()
                .map(|trial_id| self.executor.execute(run, trial_id, &self.cancel))
                .collect::<Result<Vec<TrialRecord>>>()
        };
        let mut trials = match &self.pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        }?;
        trials.sort_by_key(|t| t.trial_id);

        log::debug!("{} trials finished in {:?}", run.label, start.elapsed());
        Ok(trials)
    }

    /// Run every trial of `run` and summarize them
    pub fn run(&self, run: &Run) -> Result<RunResult> {
        let trials = self.run_trials(run)?;
        let summary = aggregate_run(run, &trials)?;

        let c = &summary.counts;
        log::info!(
            "{}: {} completed, {} ruined, {} failed, {} cancelled (success {:.1}%)",
            run.label,
            c.completed,
            c.ruined,
            c.failed,
            c.cancelled,
            summary.success_probability * 100.0
        );
        if !summary.failed_trial_ids.is_empty() {
            log::warn!("{}: failed trial ids {:?}", run.label, summary.failed_trial_ids);
        }

        Ok(RunResult { summary, trials })
    }

    /// Run a sweep; one run's setup error does not stop the others
    pub fn run_sweep(&self, runs: &[Run]) -> Vec<Result<RunResult>> {
        runs.iter()
            .map(|run| {
                let result = self.run(run);
                if let Err(err) = &result {
                    log::warn!("Run {} aborted: {}", run.label, err);
                }
                result
            })
            .collect()
    }
}
