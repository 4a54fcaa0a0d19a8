//! Result export: pretty JSON report, per-trial and per-year CSV

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{RunSummary, SensitivityDelta};
use crate::error::Result;
use crate::trial::{RuinReason, TrialRecord, TrialStatus};

/// Everything a sweep reports, stamped with when it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    pub optimizer: String,
    pub runs: Vec<RunSummary>,
    #[serde(default)]
    pub sensitivity: Vec<SensitivityDelta>,
}

impl SummaryReport {
    pub fn new(optimizer: impl Into<String>, runs: Vec<RunSummary>, sensitivity: Vec<SensitivityDelta>) -> Self {
        Self {
            generated_at: Utc::now(),
            optimizer: optimizer.into(),
            runs,
            sensitivity,
        }
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn write_json_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        log::info!("Summary written to {}", path.as_ref().display());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TrialRow<'a> {
    run_label: &'a str,
    trial_id: u32,
    rates_seed: u64,
    longevity_seed: u64,
    horizon_years: u32,
    status: &'static str,
    end_year: u32,
    detail: String,
    total_spending_nominal: f64,
    total_spending_real: f64,
    total_conversions_nominal: f64,
    total_taxes_nominal: f64,
    terminal_bequest_nominal: f64,
    terminal_bequest_real: f64,
    final_price_index: f64,
}

/// Years simulated and a short reason for anything but completion
fn status_detail(trial: &TrialRecord) -> (u32, String) {
    match &trial.status {
        TrialStatus::Completed => (trial.horizon_years, String::new()),
        TrialStatus::Ruined { year, reason } => {
            let detail = match reason {
                RuinReason::InsufficientFunds { shortfall } => format!("insufficient funds, short {:.2}", shortfall),
                RuinReason::BelowSpendingFloor { total, floor } => {
                    format!("balance {:.2} below floor {:.2}", total, floor)
                }
            };
            (*year, detail)
        }
        TrialStatus::Failed { year, reason, .. } => (*year, reason.clone()),
        TrialStatus::Cancelled { year } => (*year, "cancelled".to_string()),
    }
}

/// One row per trial
pub fn write_trials_csv<W: Write>(trials: &[TrialRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for t in trials {
        let (end_year, detail) = status_detail(t);
        wtr.serialize(TrialRow {
            run_label: &t.run_label,
            trial_id: t.trial_id,
            rates_seed: t.seeds.rates,
            longevity_seed: t.seeds.longevity,
            horizon_years: t.horizon_years,
            status: t.status.label(),
            end_year,
            detail,
            total_spending_nominal: t.metrics.total_spending_nominal,
            total_spending_real: t.metrics.total_spending_real,
            total_conversions_nominal: t.metrics.total_conversions_nominal,
            total_taxes_nominal: t.metrics.total_taxes_nominal,
            terminal_bequest_nominal: t.metrics.terminal_bequest_nominal,
            terminal_bequest_real: t.metrics.terminal_bequest_real,
            final_price_index: t.metrics.final_price_index,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct YearRow<'a> {
    run_label: &'a str,
    trial_id: u32,
    year: u32,
    calendar_year: i32,
    equity: f64,
    bonds: f64,
    cash: f64,
    inflation: f64,
    start_total: f64,
    net_spending: f64,
    roth_conversion: f64,
    taxes: f64,
    end_taxable: f64,
    end_tax_deferred: f64,
    end_tax_free: f64,
    end_total: f64,
    price_index: f64,
    forecast_gap: Option<f64>,
}

/// One row per simulated year of every trial
pub fn write_years_csv<W: Write>(trials: &[TrialRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for t in trials {
        for y in &t.years {
            let end = &y.after.balances;
            wtr.serialize(YearRow {
                run_label: &t.run_label,
                trial_id: t.trial_id,
                year: y.before.year,
                calendar_year: y.calendar_year,
                equity: y.assumptions.equity,
                bonds: y.assumptions.bonds,
                cash: y.assumptions.cash,
                inflation: y.assumptions.inflation,
                start_total: y.before.total(),
                net_spending: y.decision.net_spending,
                roth_conversion: y.decision.roth_conversion,
                taxes: y.decision.taxes,
                end_taxable: end.taxable,
                end_tax_deferred: end.tax_deferred,
                end_tax_free: end.tax_free,
                end_total: end.total(),
                price_index: y.after.price_index,
                forecast_gap: y.forecast_gap,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trials_csv_path<P: AsRef<Path>>(trials: &[TrialRecord], path: P) -> Result<()> {
    write_trials_csv(trials, BufWriter::new(File::create(path.as_ref())?))?;
    log::info!("Trial rows written to {}", path.as_ref().display());
    Ok(())
}

pub fn write_years_csv_path<P: AsRef<Path>>(trials: &[TrialRecord], path: P) -> Result<()> {
    write_years_csv(trials, BufWriter::new(File::create(path.as_ref())?))?;
    log::info!("Year rows written to {}", path.as_ref().display());
    Ok(())
}
