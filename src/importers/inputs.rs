//! Locate the broker exports in a data directory and infer the fiscal year
//! from their file names.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, TaxError};

pub const DEFAULT_TRANSACTIONS_PATTERN: &str = "Individual_*_Transactions_*.csv";
pub const DEFAULT_REALIZED_PATTERN: &str = "*_GainLoss_Realized_Details_*.csv";
pub const DEFAULT_POSITIONS_PATTERN: &str = "Individual-Positions*.csv";

static YEAR_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20\d{2})").expect("valid regex"));

/// Resolved inputs for the income report
#[derive(Debug, Clone, PartialEq)]
pub struct DataInputs {
    pub transactions_csv: PathBuf,
    pub realized_csv: PathBuf,
    pub year: i32,
}

/// Resolved inputs for the foreign-asset report
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs720 {
    pub positions_csv: PathBuf,
    pub year: i32,
}

/// First `20xx` in the file name
pub fn infer_year_from_filename(path: &Path) -> Result<i32> {
    let name = file_name(path);
    YEAR_IN_NAME
        .captures(&name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or(TaxError::YearNotInFilename { file: name })
}

/// Files directly inside `dir` whose names match the glob `pattern`
/// (`*` and `?` wildcards), sorted by name.
pub fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob_to_regex(pattern)?;
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| TaxError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && matcher.is_match(&file_name(p)))
        .collect();
    matches.sort_by_key(|p| file_name(p));
    Ok(matches)
}

/// Pick one file for `label` among the pattern matches.
///
/// With several matches, a year override keeps only the files whose names
/// carry that year; without one, the names must all agree on the year. The
/// last remaining file by name wins (broker exports embed a timestamp).
pub fn pick_single(
    dir: &Path,
    pattern: &str,
    label: &str,
    year_override: Option<i32>,
) -> Result<PathBuf> {
    let mut candidates = glob_files(dir, pattern)?;
    if candidates.len() > 1 {
        let names = || candidates.iter().map(|p| file_name(p)).collect::<Vec<_>>();
        match year_override {
            Some(year) => {
                let all = names();
                candidates.retain(|p| infer_year_from_filename(p).ok() == Some(year));
                if candidates.is_empty() {
                    return Err(TaxError::NoInputForYear {
                        label: label.to_string(),
                        year,
                        candidates: all,
                    });
                }
            }
            None => {
                let years: Vec<Option<i32>> = candidates
                    .iter()
                    .map(|p| infer_year_from_filename(p).ok())
                    .collect();
                if years.windows(2).any(|w| w[0] != w[1]) {
                    return Err(TaxError::AmbiguousInput {
                        label: label.to_string(),
                        candidates: names(),
                    });
                }
            }
        }
    }

    let several = candidates.len() > 1;
    match candidates.pop() {
        None => Err(TaxError::InputNotFound {
            label: label.to_string(),
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        }),
        Some(chosen) => {
            if several {
                warn!(
                    "Several files match {} ('{}'); using the most recent by name: {}",
                    label,
                    pattern,
                    file_name(&chosen)
                );
            }
            Ok(chosen)
        }
    }
}

/// Resolve the transactions and realized exports for the income report.
///
/// Both file names must agree on the year unless `year` is given.
pub fn resolve_inputs(
    data_dir: &Path,
    pattern_transactions: &str,
    pattern_realized: &str,
    year: Option<i32>,
) -> Result<DataInputs> {
    let transactions_csv = pick_single(data_dir, pattern_transactions, "transactions", year)?;
    let realized_csv = pick_single(data_dir, pattern_realized, "realized gain/loss", year)?;

    let year = match year {
        Some(y) => y,
        None => {
            let y_tx = infer_year_from_filename(&transactions_csv)?;
            let y_rg = infer_year_from_filename(&realized_csv)?;
            if y_tx != y_rg {
                return Err(TaxError::AmbiguousYear {
                    details: format!("transactions={}, realized={}", y_tx, y_rg),
                });
            }
            y_tx
        }
    };

    info!(
        "Inputs for {}: {:?}, {:?}",
        year, transactions_csv, realized_csv
    );
    Ok(DataInputs {
        transactions_csv,
        realized_csv,
        year,
    })
}

/// Resolve the positions export for the foreign-asset report
pub fn resolve_positions_inputs(
    data_dir: &Path,
    pattern_positions: &str,
    year: Option<i32>,
) -> Result<Inputs720> {
    let positions_csv = pick_single(data_dir, pattern_positions, "positions", year)?;
    let year = match year {
        Some(y) => y,
        None => infer_year_from_filename(&positions_csv)?,
    };

    info!("Inputs for {}: {:?}", year, positions_csv);
    Ok(Inputs720 {
        positions_csv,
        year,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| TaxError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
