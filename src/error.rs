//! Error handling for dec-renta
//!
//! The FX, conversion and aggregation core returns [`TaxError`] so callers can
//! match on the failure kind. The importer, metadata and CLI layers use anyhow
//! for context chaining; every `TaxError` converts into `anyhow::Error`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a report run
#[derive(Error, Debug)]
pub enum TaxError {
    #[error("rate endpoint unavailable ({url}): {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    #[error("malformed rate data from {source_name}: {reason}")]
    MalformedResponse { source_name: String, reason: String },

    #[error("no USD/EUR rate available for {date}")]
    RateUnavailable { date: NaiveDate },

    #[error("invalid USD/EUR rate {rate}: must be greater than zero")]
    InvalidRate { rate: Decimal },

    #[error("converting {amount} USD at {rate} USD/EUR overflows")]
    ConversionOverflow { amount: Decimal, rate: Decimal },

    #[error("no gain/loss column found. Available: {available:?}")]
    NoGainLossColumn { available: Vec<String> },

    #[error("input files disagree on the fiscal year: {details}. Use --year")]
    AmbiguousYear { details: String },

    #[error("no file for {label} matching '{pattern}' in {}", dir.display())]
    InputNotFound {
        label: String,
        dir: PathBuf,
        pattern: String,
    },

    #[error("several files for {label} with different years: {candidates:?}")]
    AmbiguousInput {
        label: String,
        candidates: Vec<String>,
    },

    #[error("no file for {label} from {year} among {candidates:?}")]
    NoInputForYear {
        label: String,
        year: i32,
        candidates: Vec<String>,
    },

    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cannot infer the year from file name: {file}")]
    YearNotInFilename { file: String },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaxError {
    /// Wrap an I/O failure with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaxError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for the FX and aggregation core
pub type Result<T> = std::result::Result<T, TaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = TaxError::RateUnavailable {
            date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        };
        assert_eq!(err.to_string(), "no USD/EUR rate available for 2023-01-01");
    }

    #[test]
    fn test_no_gain_loss_column_lists_available() {
        let err = TaxError::NoGainLossColumn {
            available: vec!["Symbol".to_string(), "Proceeds".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Symbol"));
        assert!(msg.contains("Proceeds"));
    }

    #[test]
    fn test_io_error_names_the_path() {
        let err = TaxError::io(
            "/var/cache/fx_usd_per_eur_2023.csv",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/var/cache/fx_usd_per_eur_2023.csv"));
    }

    #[test]
    fn test_anyhow_preserves_variant() {
        let err: anyhow::Error = TaxError::YearNotInFilename {
            file: "positions.csv".to_string(),
        }
        .into();
        assert!(matches!(
            err.downcast_ref::<TaxError>(),
            Some(TaxError::YearNotInFilename { .. })
        ));
    }
}
