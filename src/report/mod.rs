//! Report generation: income summary (Modelo 100) and foreign securities
//! declaration draft (Modelo 720)

pub mod aggregate;
pub mod dictionary;
pub mod modelo720;
pub mod writer;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::fx::{DenseRateCalendar, RateCache, RateSource};
use crate::importers::{load_positions, load_realized, load_transactions, DataInputs, Inputs720};
use crate::metadata::MetadataProvider;
pub use aggregate::{
    annual_summary, join_by_symbol, AggregationEngine, AnnualSummary, PositionValuation,
    SymbolAggregate, SymbolKey,
};
pub use modelo720::{build_rows, Modelo720Row};

/// Files written by the income report, with the figures they contain
#[derive(Debug, Clone)]
pub struct IncomeReport {
    pub summary: AnnualSummary,
    pub breakdown: Vec<SymbolAggregate>,
    pub summary_path: PathBuf,
    pub breakdown_path: PathBuf,
}

/// Foreign securities draft and its rows
#[derive(Debug, Clone)]
pub struct Modelo720Report {
    pub year: i32,
    pub rows: Vec<Modelo720Row>,
    pub path: PathBuf,
}

/// Build the year's rate calendar, convert and aggregate dividends,
/// withholding and realized gains, and write the annual summary and the
/// per-symbol breakdown into `out_dir`.
pub fn generate_reports<S: RateSource>(
    cache: &RateCache<S>,
    inputs: &DataInputs,
    out_dir: &Path,
    refresh_fx: bool,
) -> Result<IncomeReport> {
    let year = inputs.year;
    let calendar = DenseRateCalendar::build(cache, year, refresh_fx)?;

    let transactions = load_transactions(&inputs.transactions_csv)?;
    let realized = load_realized(&inputs.realized_csv)?;

    let engine = AggregationEngine::new(&calendar);
    let dividends = engine.aggregate_dividends(&transactions)?;
    let gains = engine.aggregate_realized(&realized)?;

    let summary = annual_summary(year, &dividends, &gains);
    let breakdown = join_by_symbol(&dividends, &gains);

    let summary_path = writer::summary_path(out_dir, year);
    let breakdown_path = writer::breakdown_path(out_dir, year);
    writer::write_summary(&summary_path, &summary)?;
    writer::write_breakdown(&breakdown_path, &breakdown)?;

    info!(
        "Income report for {}: {} symbols",
        year,
        breakdown.len()
    );
    Ok(IncomeReport {
        summary,
        breakdown,
        summary_path,
        breakdown_path,
    })
}

/// Value the year-end positions at the Dec 31 rate, attach issuer metadata
/// and write `modelo_720_<year>.csv` into `out_dir`.
pub fn generate_report_720<S, P>(
    cache: &RateCache<S>,
    inputs: &Inputs720,
    metadata: &P,
    out_dir: &Path,
    refresh_fx: bool,
) -> Result<Modelo720Report>
where
    S: RateSource,
    P: MetadataProvider + ?Sized,
{
    let year = inputs.year;
    let calendar = DenseRateCalendar::build(cache, year, refresh_fx)?;

    let positions = load_positions(&inputs.positions_csv)?;
    let valued = AggregationEngine::new(&calendar).value_positions(&positions)?;

    let tickers: Vec<String> = valued.iter().map(|p| p.ticker.clone()).collect();
    let table = metadata.metadata_for(&tickers)?;
    let rows = build_rows(&valued, &table);

    let path = writer::modelo_720_path(out_dir, year);
    writer::write_modelo_720(&path, &rows)?;

    info!("Modelo 720 draft for {}: {} holdings", year, rows.len());
    Ok(Modelo720Report { year, rows, path })
}
