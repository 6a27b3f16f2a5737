//! Per-year flat-file cache for raw USD/EUR series
//!
//! One file per fiscal year, `fx_usd_per_eur_<year>.csv`, holding the sparse
//! observations exactly as fetched (`date,usd_per_eur`). An existing file is
//! reused without any freshness check unless a refresh is requested.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::source::RateSource;
use super::{RateObservation, RawRateSeries};
use crate::config::FxConfig;
use crate::error::{Result, TaxError};

const CACHE_PREFIX: &str = "fx_usd_per_eur_";

pub struct RateCache<S: RateSource> {
    config: FxConfig,
    source: S,
}

impl<S: RateSource> RateCache<S> {
    pub fn new(config: FxConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn cache_path(&self, year: i32) -> PathBuf {
        cache_file_path(&self.config.cache_dir, year)
    }

    /// Read the cached series for `year`, if a cache file exists.
    ///
    /// A truncated or otherwise unreadable file is reported as
    /// `MalformedResponse`.
    pub fn load(&self, year: i32) -> Result<Option<RawRateSeries>> {
        let path = self.cache_path(year);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| TaxError::io(&path, e))?;
        let series = parse_cache_csv(&content, &path.display().to_string())?;
        debug!("Loaded {} cached rates from {:?}", series.len(), path);
        Ok(Some(series))
    }

    /// Overwrite the cache file for `year` with `series`.
    pub fn store(&self, year: i32, series: &RawRateSeries) -> Result<()> {
        let cache_dir = &self.config.cache_dir;
        fs::create_dir_all(cache_dir).map_err(|e| TaxError::io(cache_dir, e))?;
        let path = self.cache_path(year);

        let mut writer = csv::Writer::from_writer(Vec::new());
        let write_err = |e: csv::Error| TaxError::io(&path, std::io::Error::other(e));
        writer
            .write_record(["date", "usd_per_eur"])
            .map_err(write_err)?;
        for obs in series.observations() {
            writer
                .write_record([obs.date.format("%Y-%m-%d").to_string(), obs.usd_per_eur.to_string()])
                .map_err(write_err)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TaxError::io(&path, std::io::Error::other(e.to_string())))?;

        let tmp_path = path.with_extension("csv.tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| TaxError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| TaxError::io(&path, e))?;

        if year_in_progress(year, series) {
            warn!(
                "Cached USD/EUR rates for {} end on {:?}; the year is not over and later runs will reuse this partial series unless --refresh-fx is given",
                year,
                series.last_date()
            );
        }
        debug!("Cached {} rates to {:?}", series.len(), path);
        Ok(())
    }

    /// Cached series for `year`, fetching and caching it on a miss or when
    /// `refresh` is set.
    pub fn get_or_fetch(&self, year: i32, refresh: bool) -> Result<RawRateSeries> {
        if !refresh {
            if let Some(series) = self.load(year)? {
                if year_in_progress(year, &series) {
                    warn!(
                        "Using cached USD/EUR rates for {} that end on {:?}; pass --refresh-fx to update",
                        year,
                        series.last_date()
                    );
                }
                return Ok(series);
            }
        }

        let (start, end) = year_bounds(year)?;
        info!("Fetching USD/EUR rates for {} (refresh: {})", year, refresh);
        let series = self.source.fetch(start, end)?;
        self.store(year, &series)?;
        Ok(series)
    }
}

pub fn cache_file_path(cache_dir: &Path, year: i32) -> PathBuf {
    cache_dir.join(format!("{}{}.csv", CACHE_PREFIX, year))
}

/// Delete one year's cache file, or all of them. Returns the number removed.
pub fn clear_cache(cache_dir: &Path, year: Option<i32>) -> Result<usize> {
    if !cache_dir.exists() {
        return Ok(0);
    }

    match year {
        Some(y) => {
            let path = cache_file_path(cache_dir, y);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| TaxError::io(&path, e))?;
                info!("Deleted FX cache for {}", y);
                Ok(1)
            } else {
                Ok(0)
            }
        }
        None => {
            let mut removed = 0;
            let entries = fs::read_dir(cache_dir).map_err(|e| TaxError::io(cache_dir, e))?;
            for entry in entries {
                let path = entry.map_err(|e| TaxError::io(cache_dir, e))?.path();
                let is_cache_file = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(CACHE_PREFIX) && n.ends_with(".csv"))
                    .unwrap_or(false);
                if is_cache_file {
                    fs::remove_file(&path).map_err(|e| TaxError::io(&path, e))?;
                    removed += 1;
                }
            }
            info!("Cleared {} FX cache files", removed);
            Ok(removed)
        }
    }
}

/// Parse a cache file written by [`RateCache::store`].
///
/// Unlike the ECB payload, every row must carry exactly a date and a positive
/// rate; a short, blank or unparseable row means the file was truncated or
/// edited and the whole file is rejected.
fn parse_cache_csv(content: &str, source_name: &str) -> Result<RawRateSeries> {
    let malformed = |reason: String| TaxError::MalformedResponse {
        source_name: source_name.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| malformed(format!("unreadable header: {}", e)))?;
    if headers.len() != 2 || &headers[0] != "date" || &headers[1] != "usd_per_eur" {
        return Err(malformed(format!("unexpected header {:?}", headers)));
    }

    let mut observations = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = idx + 2;
        let record = result.map_err(|e| malformed(format!("row {}: {}", row, e)))?;
        if record.len() != 2 {
            return Err(malformed(format!(
                "row {}: expected 2 fields, found {}",
                row,
                record.len()
            )));
        }
        let (date_str, rate_str) = (record[0].trim(), record[1].trim());
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| malformed(format!("row {}: invalid date '{}'", row, date_str)))?;
        let usd_per_eur = Decimal::from_str(rate_str)
            .map_err(|_| malformed(format!("row {}: invalid rate '{}'", row, rate_str)))?;
        if usd_per_eur <= Decimal::ZERO {
            return Err(malformed(format!(
                "row {}: non-positive rate {}",
                row, usd_per_eur
            )));
        }
        observations.push(RateObservation { date, usd_per_eur });
    }

    if observations.is_empty() {
        return Err(malformed("no rate rows".to_string()));
    }
    Ok(RawRateSeries::new(observations))
}

pub(crate) fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    match (start, end) {
        (Some(s), Some(e)) => Ok((s, e)),
        _ => Err(TaxError::MalformedResponse {
            source_name: "calendar".to_string(),
            reason: format!("year {} is out of range", year),
        }),
    }
}

fn year_in_progress(year: i32, series: &RawRateSeries) -> bool {
    let today = Local::now().date_naive();
    match year_bounds(year) {
        Ok((_, dec31)) => today <= dec31 && series.last_date().is_some_and(|d| d < dec31),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::RateObservation;
    use rust_decimal_macros::dec;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl RateSource for CountingSource {
        fn fetch(&self, start: NaiveDate, _end: NaiveDate) -> Result<RawRateSeries> {
            self.calls.set(self.calls.get() + 1);
            Ok(RawRateSeries::new(vec![RateObservation {
                date: start.succ_opt().unwrap(),
                usd_per_eur: dec!(1.0683),
            }]))
        }
    }

    fn cache_in(dir: &TempDir) -> RateCache<CountingSource> {
        RateCache::new(
            FxConfig::with_cache_dir(dir.path().join("fx")),
            CountingSource {
                calls: Cell::new(0),
            },
        )
    }

    #[test]
    fn test_cache_file_name_is_scoped_by_year() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(cache
            .cache_path(2023)
            .ends_with("fx/fx_usd_per_eur_2023.csv"));
    }

    #[test]
    fn test_load_missing_year_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(cache.load(2023).unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let series = RawRateSeries::new(vec![
            RateObservation {
                date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                usd_per_eur: dec!(1.0683),
            },
            RateObservation {
                date: NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
                usd_per_eur: dec!(1.105),
            },
        ]);
        cache.store(2023, &series).unwrap();

        let content = fs::read_to_string(cache.cache_path(2023)).unwrap();
        assert!(content.starts_with("date,usd_per_eur\n2023-01-02,1.0683\n"));
        assert_eq!(cache.load(2023).unwrap(), Some(series));
    }

    #[test]
    fn test_truncated_cache_file_is_malformed() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        fs::create_dir_all(cache.cache_dir()).unwrap();

        for truncated in [
            "date,usd_per_eur\n2023-01-0",
            "date,usd_per_eur\n2023-01-02,1.0683\n2023-03-1",
            "date,usd_per_eur\n2023-01-02,1.0683\n2023-03-15,",
        ] {
            fs::write(cache.cache_path(2023), truncated).unwrap();
            let result = cache.get_or_fetch(2023, false);
            assert!(
                matches!(result, Err(TaxError::MalformedResponse { .. })),
                "{:?}",
                truncated
            );
        }
        assert_eq!(cache.source().calls.get(), 0);
    }

    #[test]
    fn test_cache_rows_with_extra_fields_are_malformed() {
        let err = parse_cache_csv("date,usd_per_eur\n2023-01-02,1.0683,A\n", "cache").unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn test_unwritable_cache_dir_error_names_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("fx");
        fs::write(&blocker, "not a directory").unwrap();
        let cache = cache_in(&dir);

        let err = cache.get_or_fetch(2023, false).unwrap_err();
        assert!(matches!(err, TaxError::Io { .. }));
        assert!(err.to_string().contains(&blocker.display().to_string()));
    }

    #[test]
    fn test_clear_single_year_and_all() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.get_or_fetch(2022, false).unwrap();
        cache.get_or_fetch(2023, false).unwrap();

        assert_eq!(clear_cache(cache.cache_dir(), Some(2022)).unwrap(), 1);
        assert!(!cache.cache_path(2022).exists());
        assert_eq!(clear_cache(cache.cache_dir(), None).unwrap(), 1);
        assert!(!cache.cache_path(2023).exists());
    }
}
