//! Roost trial runner
//!
//! Runs every arm of an experiment plan through the annual re-optimization
//! loop and writes the summary report plus per-trial and per-year CSVs.
//!
//! Usage:
//!   roost --plan plan.json [--trials N] [--seed S] [--jobs J] [--out-dir DIR]
//!   roost --plan plan.json --replay 17          # one trial, trace as JSON

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use roost_trials::aggregate::compare_to_baseline;
use roost_trials::export::{write_trials_csv_path, write_years_csv_path, SummaryReport};
use roost_trials::{BatchRunner, CancelToken, HeuristicOptimizer, RunPlan};

#[derive(Parser)]
#[command(name = "roost")]
#[command(version, about = "Annual re-optimization trials for retirement policies")]
struct Cli {
    /// Experiment plan (JSON)
    #[arg(short, long)]
    plan: PathBuf,

    /// Override the number of trials per run
    #[arg(short, long)]
    trials: Option<u32>,

    /// Override the master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-call optimizer budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Sample a stochastic horizon per trial from the longevity model
    #[arg(long)]
    longevity: bool,

    /// Flat tax rate used by the built-in optimizer
    #[arg(long, default_value = "0.22")]
    tax_rate: f64,

    /// Directory for summary.json, trials.csv and years.csv
    #[arg(short, long, default_value = "roost_output")]
    out_dir: PathBuf,

    /// Replay a single trial id of the first run and print its trace
    #[arg(long)]
    replay: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut plan = RunPlan::from_json_path(&cli.plan)
        .with_context(|| format!("loading plan {}", cli.plan.display()))?;
    if let Some(trials) = cli.trials {
        plan.batch.trials = trials;
    }
    if let Some(seed) = cli.seed {
        plan.batch.master_seed = seed;
    }
    if cli.jobs.is_some() {
        plan.batch.jobs = cli.jobs;
    }
    if cli.timeout_ms.is_some() {
        plan.batch.optimizer_timeout_ms = cli.timeout_ms;
    }
    plan.batch.sample_longevity |= cli.longevity;

    let runs = plan.build_runs().context("building runs")?;
    let optimizer = Arc::new(HeuristicOptimizer::new(cli.tax_rate));
    let runner = BatchRunner::new(optimizer, &plan.batch).context("starting batch runner")?;

    if let Some(trial_id) = cli.replay {
        let Some(run) = runs.first() else { bail!("plan has no runs") };
        let record = runner
            .executor()
            .execute(run, trial_id, &CancelToken::new())
            .with_context(|| format!("replaying trial {}", trial_id))?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let start = Instant::now();
    let mut summaries = Vec::new();
    let mut trials = Vec::new();
    // Aborted runs are logged by the sweep and left out of the report
    for result in runner.run_sweep(&runs).into_iter().flatten() {
        summaries.push(result.summary);
        trials.extend(result.trials);
    }
    if summaries.is_empty() {
        bail!("no run produced results");
    }

    let sensitivity = if summaries.len() > 1 {
        compare_to_baseline(&summaries).context("comparing runs")?
    } else {
        Vec::new()
    };

    println!("\n{:<48} {:>9} {:>7} {:>7} {:>7} {:>14}", "Run", "Success", "Ruined", "Failed", "Cancel", "Median estate");
    for s in &summaries {
        let median = s
            .terminal_bequest_real
            .map(|d| format!("{:.0}", d.p50))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<48} {:>8.1}% {:>7} {:>7} {:>7} {:>14}",
            s.run_label,
            s.success_probability * 100.0,
            s.counts.ruined,
            s.counts.failed,
            s.counts.cancelled,
            median
        );
    }

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    SummaryReport::new("heuristic", summaries, sensitivity).write_json_path(cli.out_dir.join("summary.json"))?;
    write_trials_csv_path(&trials, cli.out_dir.join("trials.csv"))?;
    write_years_csv_path(&trials, cli.out_dir.join("years.csv"))?;

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
