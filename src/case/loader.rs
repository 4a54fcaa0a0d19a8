//! Load cases from JSON configuration records

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::Case;
use crate::error::Result;

/// Load and validate a case from a JSON file
pub fn load_case<P: AsRef<Path>>(path: P) -> Result<Case> {
    let file = File::open(path.as_ref())?;
    load_case_from_reader(BufReader::new(file))
}

/// Load and validate a case from any reader (e.g., string buffer, network stream)
pub fn load_case_from_reader<R: Read>(reader: R) -> Result<Case> {
    let case: Case = serde_json::from_reader(reader)?;
    case.validate()?;
    log::debug!("Loaded case '{}' ({} years)", case.name, case.horizon_years);
    Ok(case)
}
