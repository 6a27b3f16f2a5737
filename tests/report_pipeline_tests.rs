use chrono::NaiveDate;
use dec_renta::config::FxConfig;
use dec_renta::error::{Result, TaxError};
use dec_renta::fx::{DenseRateCalendar, RateCache, RateObservation, RateSource, RawRateSeries};
use dec_renta::importers::{resolve_inputs, resolve_positions_inputs, DataInputs};
use dec_renta::importers::inputs::{
    DEFAULT_POSITIONS_PATTERN, DEFAULT_REALIZED_PATTERN, DEFAULT_TRANSACTIONS_PATTERN,
};
use dec_renta::metadata::{
    EnrichingMetadataProvider, LocalMetadataProvider, MetadataTable, RemoteMetadataSource,
    TickerMetadata,
};
use dec_renta::report::{generate_report_720, generate_reports};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Serves a fixed set of observations and counts fetches
struct FixedSource {
    observations: Vec<RateObservation>,
    calls: Cell<usize>,
}

impl FixedSource {
    fn new(rates: &[(i32, u32, u32, Decimal)]) -> Self {
        Self {
            observations: rates
                .iter()
                .map(|&(y, m, d, r)| RateObservation {
                    date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    usd_per_eur: r,
                })
                .collect(),
            calls: Cell::new(0),
        }
    }
}

impl RateSource for FixedSource {
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawRateSeries> {
        self.calls.set(self.calls.get() + 1);
        Ok(RawRateSeries::new(
            self.observations
                .iter()
                .copied()
                .filter(|o| o.date >= start && o.date <= end)
                .collect(),
        ))
    }
}

fn source_2023() -> FixedSource {
    FixedSource::new(&[
        (2023, 1, 2, dec!(1.0683)),
        (2023, 3, 15, dec!(1.05)),
        (2023, 6, 1, dec!(1.07)),
        (2023, 12, 29, dec!(1.105)),
    ])
}

fn copy_schwab_fixtures(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for entry in fs::read_dir("tests/fixtures/schwab").unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, dir.join(path.file_name().unwrap())).unwrap();
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn cache_is_idempotent_and_fetches_once() {
    let tmp = TempDir::new().unwrap();
    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path()), source_2023());

    let first = cache.get_or_fetch(2023, false).unwrap();
    let second = cache.get_or_fetch(2023, false).unwrap();

    assert_eq!(cache.source().calls.get(), 1);
    assert_eq!(first, second);
    assert!(tmp.path().join("fx_usd_per_eur_2023.csv").exists());
}

#[test]
fn refresh_always_fetches_and_overwrites() {
    let tmp = TempDir::new().unwrap();
    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path()), source_2023());

    cache.get_or_fetch(2023, false).unwrap();
    cache.get_or_fetch(2023, true).unwrap();
    cache.get_or_fetch(2023, true).unwrap();
    assert_eq!(cache.source().calls.get(), 3);
}

#[test]
fn existing_cache_file_is_used_without_fetching() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("fx_usd_per_eur_2023.csv"),
        "date,usd_per_eur\n2023-03-15,1.25\n",
    )
    .unwrap();
    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path()), source_2023());

    let calendar = DenseRateCalendar::build(&cache, 2023, false).unwrap();
    assert_eq!(cache.source().calls.get(), 0);
    assert_eq!(calendar.rate_on(date(2023, 12, 31)).unwrap(), dec!(1.25));
}

#[test]
fn calendar_forward_fills_over_weekends_and_holidays() {
    let tmp = TempDir::new().unwrap();
    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path()), source_2023());
    let calendar = DenseRateCalendar::build(&cache, 2023, false).unwrap();

    assert_eq!(calendar.len(), 365);
    assert!(matches!(
        calendar.rate_on(date(2023, 1, 1)),
        Err(TaxError::RateUnavailable { .. })
    ));
    assert_eq!(calendar.rate_on(date(2023, 3, 18)).unwrap(), dec!(1.05));
    assert_eq!(calendar.rate_on(date(2023, 12, 31)).unwrap(), dec!(1.105));
}

#[test]
fn income_report_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    copy_schwab_fixtures(&data);

    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path().join("fx")), source_2023());
    let inputs = resolve_inputs(
        &data,
        DEFAULT_TRANSACTIONS_PATTERN,
        DEFAULT_REALIZED_PATTERN,
        None,
    )
    .unwrap();
    assert_eq!(inputs.year, 2023);

    let report = generate_reports(&cache, &inputs, &out, false).unwrap();

    let msft = report
        .breakdown
        .iter()
        .find(|r| r.symbol.as_deref() == Some("MSFT"))
        .unwrap();
    // 50 USD at 1.05 USD/EUR
    assert_eq!(msft.dividend_gross_eur.round_dp(2), dec!(47.62));
    assert_eq!(
        msft.dividend_net_eur,
        msft.dividend_gross_eur + msft.foreign_tax_eur
    );
    assert_eq!(report.summary.realized_gainloss_eur, dec!(200));
    assert!(report.summary_path.ends_with("resumen_anual_2023.csv"));
    assert!(report.breakdown_path.exists());
}

#[test]
fn rate_unavailable_aborts_before_writing() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    copy_schwab_fixtures(&data);

    // No observation before the March dividends
    let source = FixedSource::new(&[(2023, 6, 1, dec!(1.07))]);
    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path().join("fx")), source);
    let inputs = DataInputs {
        transactions_csv: data.join("Individual_XXX123_Transactions_20231231-093000.csv"),
        realized_csv: data.join("XXX123_GainLoss_Realized_Details_20231231-093100.csv"),
        year: 2023,
    };

    let err = generate_reports(&cache, &inputs, &out, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaxError>(),
        Some(TaxError::RateUnavailable { .. })
    ));
    assert!(!out.join("resumen_anual_2023.csv").exists());
}

struct StaticRemote;

impl RemoteMetadataSource for StaticRemote {
    fn lookup(&self, ticker: &str) -> anyhow::Result<TickerMetadata> {
        Ok(TickerMetadata {
            ticker: ticker.to_string(),
            isin: "US9229083632".to_string(),
            domicile: "100 Vanguard Blvd, Malvern, PA, 19355, United States".to_string(),
            city: "Malvern".to_string(),
            country: "US".to_string(),
        })
    }
}

#[test]
fn modelo_720_enrichment_writes_metadata_back() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    copy_schwab_fixtures(&data);
    let metadata_path = data.join("ticker_metadata.csv");
    fs::copy("tests/fixtures/ticker_metadata.csv", &metadata_path).unwrap();

    let cache = RateCache::new(FxConfig::with_cache_dir(tmp.path().join("fx")), source_2023());
    let inputs = resolve_positions_inputs(&data, DEFAULT_POSITIONS_PATTERN, None).unwrap();
    let provider =
        EnrichingMetadataProvider::new(LocalMetadataProvider::new(&metadata_path), StaticRemote);

    let report = generate_report_720(&cache, &inputs, &provider, &out, false).unwrap();

    let tickers: Vec<&str> = report.rows.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "VOO"]);
    // Local values are kept; only blanks are filled
    assert_eq!(report.rows[0].isin, "US0378331005");
    assert_eq!(report.rows[1].isin, "US9229083632");
    assert_eq!(report.rows[1].city, "Malvern");
    assert_eq!(report.rows[0].value_eur.map(|v| v.round_dp(2)), Some(dec!(1742.35)));

    let saved = MetadataTable::load(&metadata_path).unwrap();
    assert_eq!(saved.get("VOO").unwrap().isin, "US9229083632");
    assert!(out.join("modelo_720_2023.csv").exists());
}
