//! CSV loader for annual rate histories
//!
//! Expected columns: `year,equity,bonds,cash,inflation`, rates as decimals,
//! one row per consecutive calendar year.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{HistoricalSeries, YearAssumptions};
use crate::error::{Result, RoostError};

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    year: i32,
    equity: f64,
    bonds: f64,
    cash: f64,
    inflation: f64,
}

/// Load a historical rate series from a CSV file
pub fn load_rate_series<P: AsRef<Path>>(path: P) -> Result<HistoricalSeries> {
    let file = File::open(path.as_ref())?;
    load_rate_series_from_reader(file)
}

/// Load a historical rate series from any reader
pub fn load_rate_series_from_reader<R: Read>(reader: R) -> Result<HistoricalSeries> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut first_year = None;
    let mut years = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        let expected = first_year.map(|first: i32| first + years.len() as i32);
        match expected {
            None => first_year = Some(row.year),
            Some(year) if year != row.year => {
                return Err(RoostError::InvalidRegimeConfig(format!(
                    "rate series expected year {} but found {}",
                    year, row.year
                )));
            }
            Some(_) => {}
        }
        years.push(YearAssumptions::new(row.equity, row.bonds, row.cash, row.inflation));
    }

    let first_year = first_year
        .ok_or_else(|| RoostError::InvalidRegimeConfig("rate series has no rows".into()))?;
    HistoricalSeries::new(first_year, years)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_series() {
        let data = "year,equity,bonds,cash,inflation\n\
                    2000,-0.091,0.116,0.058,0.034\n\
                    2001,-0.119,0.084,0.034,0.016\n\
                    2002,-0.221,0.103,0.016,0.024\n";
        let series = load_rate_series_from_reader(data.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_year(), 2000);
        assert_eq!(series.last_year(), 2002);
        assert_eq!(series.get(2).unwrap().equity, -0.221);
    }

    #[test]
    fn test_gap_in_years_rejected() {
        let data = "year,equity,bonds,cash,inflation\n\
                    2000,0.1,0.05,0.02,0.03\n\
                    2002,0.1,0.05,0.02,0.03\n";
        assert!(matches!(
            load_rate_series_from_reader(data.as_bytes()),
            Err(RoostError::InvalidRegimeConfig(_))
        ));
    }

    #[test]
    fn test_empty_series_rejected() {
        let data = "year,equity,bonds,cash,inflation\n";
        assert!(load_rate_series_from_reader(data.as_bytes()).is_err());
    }
}
