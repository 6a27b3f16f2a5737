//! Ticker metadata (ISIN and issuer domicile) for the foreign-asset report
//!
//! The local reference file is the source of truth. When remote enrichment is
//! enabled, tickers with missing fields are looked up remotely and only the
//! blank fields are filled in.

pub mod yahoo;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::config::MetadataConfig;
pub use yahoo::YahooMetadataSource;

const HEADERS: [&str; 5] = ["Ticker", "ISIN", "Domicilio Fiscal", "Poblacion", "Pais Dom Fiscal"];

/// Issuer data for one ticker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerMetadata {
    pub ticker: String,
    pub isin: String,
    pub domicile: String,
    pub city: String,
    pub country: String,
}

impl TickerMetadata {
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Self::default()
        }
    }

    /// All fields the report needs are filled in
    pub fn is_complete(&self) -> bool {
        [&self.isin, &self.domicile, &self.city, &self.country]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    /// Fill blank fields from `other`. Returns true if anything changed.
    pub fn fill_blanks_from(&mut self, other: &TickerMetadata) -> bool {
        let mut changed = false;
        for (mine, theirs) in [
            (&mut self.isin, &other.isin),
            (&mut self.domicile, &other.domicile),
            (&mut self.city, &other.city),
            (&mut self.country, &other.country),
        ] {
            if mine.trim().is_empty() && !theirs.trim().is_empty() {
                *mine = theirs.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Metadata keyed by ticker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    entries: BTreeMap<String, TickerMetadata>,
}

impl MetadataTable {
    pub fn get(&self, ticker: &str) -> Option<&TickerMetadata> {
        self.entries.get(ticker)
    }

    pub fn insert(&mut self, meta: TickerMetadata) {
        self.entries.insert(meta.ticker.clone(), meta);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tickers among `wanted` that are absent or incomplete, deduplicated
    /// and sorted
    pub fn missing(&self, wanted: &[String]) -> Vec<String> {
        let mut missing: Vec<String> = wanted
            .iter()
            .filter(|t| self.get(t).map_or(true, |m| !m.is_complete()))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Merge remote data: blanks are filled, unknown tickers appended.
    /// Returns true if the table changed.
    pub fn merge(&mut self, fetched: TickerMetadata) -> bool {
        match self.entries.get_mut(&fetched.ticker) {
            Some(existing) => existing.fill_blanks_from(&fetched),
            None => {
                self.insert(fetched);
                true
            }
        }
    }

    /// Read a local reference file. Header names are matched ignoring case,
    /// accents, `_` and `.`; missing columns read as blank.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open metadata file {:?}", path))?;
        let headers = reader
            .headers()
            .context("Failed to read metadata headers")?
            .clone();

        let index: Vec<Option<usize>> = HEADERS
            .iter()
            .map(|wanted| {
                let wanted = normalize_header(wanted);
                headers.iter().position(|h| normalize_header(h) == wanted)
            })
            .collect();
        let Some(ticker_idx) = index[0] else {
            warn!("Metadata file {:?} has no Ticker column; ignoring it", path);
            return Ok(Self::default());
        };

        let mut table = Self::default();
        for result in reader.records() {
            let record = result.context("Failed to read metadata row")?;
            let get = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };
            let ticker = get(Some(ticker_idx));
            if ticker.is_empty() {
                continue;
            }
            table.insert(TickerMetadata {
                ticker,
                isin: clean_isin(&get(index[1])),
                domicile: get(index[2]),
                city: get(index[3]),
                country: get(index[4]),
            });
        }

        debug!("Loaded metadata for {} tickers from {:?}", table.len(), path);
        Ok(table)
    }

    /// Overwrite `path` with the table, in canonical column order
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to write metadata file {:?}", path))?;
        writer.write_record(HEADERS)?;
        for meta in self.entries.values() {
            writer.write_record([
                &meta.ticker,
                &clean_isin(&meta.isin),
                &meta.domicile,
                &meta.city,
                &meta.country,
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Lookup of issuer data by ticker from an external provider
pub trait RemoteMetadataSource {
    fn lookup(&self, ticker: &str) -> Result<TickerMetadata>;
}

/// Supplies metadata for the tickers of a report
pub trait MetadataProvider {
    fn metadata_for(&self, tickers: &[String]) -> Result<MetadataTable>;
}

/// Local reference file only
pub struct LocalMetadataProvider {
    path: PathBuf,
}

impl LocalMetadataProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<MetadataTable> {
        if !self.path.exists() {
            info!("No metadata file at {:?}", self.path);
            return Ok(MetadataTable::default());
        }
        MetadataTable::load(&self.path)
    }
}

impl MetadataProvider for LocalMetadataProvider {
    fn metadata_for(&self, tickers: &[String]) -> Result<MetadataTable> {
        let table = self.load()?;
        let missing = table.missing(tickers);
        if !missing.is_empty() {
            warn!("Incomplete metadata for: {}", missing.join(", "));
        }
        Ok(table)
    }
}

/// Local reference file, completed from a remote source and written back
pub struct EnrichingMetadataProvider<R: RemoteMetadataSource> {
    local: LocalMetadataProvider,
    remote: R,
}

impl<R: RemoteMetadataSource> EnrichingMetadataProvider<R> {
    pub fn new(local: LocalMetadataProvider, remote: R) -> Self {
        Self { local, remote }
    }
}

impl<R: RemoteMetadataSource> MetadataProvider for EnrichingMetadataProvider<R> {
    fn metadata_for(&self, tickers: &[String]) -> Result<MetadataTable> {
        let mut table = self.local.load()?;
        let missing = table.missing(tickers);
        if missing.is_empty() {
            return Ok(table);
        }

        info!("Looking up metadata for {} tickers", missing.len());
        let mut changed = false;
        for ticker in &missing {
            match self.remote.lookup(ticker) {
                Ok(mut fetched) => {
                    fetched.ticker = ticker.clone();
                    fetched.isin = clean_isin(&fetched.isin);
                    changed |= table.merge(fetched);
                }
                Err(e) => warn!("Metadata lookup failed for {}: {:#}", ticker, e),
            }
        }

        if changed {
            table.save(self.local.path())?;
            info!("Updated metadata file {:?}", self.local.path());
        }
        Ok(table)
    }
}

/// Provider selected by configuration
pub fn provider_from_config(config: &MetadataConfig) -> Result<Box<dyn MetadataProvider>> {
    let local = LocalMetadataProvider::new(&config.path);
    if config.remote_enrichment {
        let remote = YahooMetadataSource::new(config.timeout_secs)?;
        Ok(Box::new(EnrichingMetadataProvider::new(local, remote)))
    } else {
        Ok(Box::new(local))
    }
}

/// Placeholder ISIN values read as blank
pub fn clean_isin(value: &str) -> String {
    match value.trim() {
        "-" | "N/A" | "NA" => String::new(),
        other => other.to_string(),
    }
}

/// ISO-2 country code from a code or a known country name; blank otherwise
pub fn normalize_country_code(country: &str) -> String {
    let value = country.trim();
    if value.chars().count() == 2 {
        return value.to_uppercase();
    }
    match value {
        "United States" | "United States of America" | "USA" => "US".to_string(),
        _ => String::new(),
    }
}

fn normalize_header(header: &str) -> String {
    let stripped: String = header
        .trim()
        .trim_start_matches('\u{feff}')
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    stripped
        .to_lowercase()
        .replace(['_', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
