//! CSV report files. Amounts are rounded to cents here and nowhere else.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::aggregate::{AnnualSummary, SymbolAggregate};
use super::modelo720::{
    Modelo720Row, ASSET_SUBTYPE, ASSET_TYPE, CUSTODIAN_COUNTRY, DECLARANT_CONDITION,
    MODELO_720_COLUMNS, ORIGIN, OWNERSHIP_PERCENT,
};
use crate::utils::format_money;

pub const SUMMARY_COLUMNS: [&str; 5] = [
    "year",
    "Dividendos_brutos_EUR",
    "Impuestos_origen_EUR",
    "Dividendos_netos_EUR",
    "Ganancia_perdida_realizada_EUR",
];

pub const BREAKDOWN_COLUMNS: [&str; 5] = [
    "symbol",
    "dividend_gross_eur",
    "foreign_tax_eur",
    "dividend_net_eur",
    "realized_gainloss_eur",
];

pub fn summary_path(out_dir: &Path, year: i32) -> PathBuf {
    out_dir.join(format!("resumen_anual_{}.csv", year))
}

pub fn breakdown_path(out_dir: &Path, year: i32) -> PathBuf {
    out_dir.join(format!("desglose_symbol_{}.csv", year))
}

pub fn modelo_720_path(out_dir: &Path, year: i32) -> PathBuf {
    out_dir.join(format!("modelo_720_{}.csv", year))
}

fn open_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))
}

/// Single-row annual totals
pub fn write_summary(path: &Path, summary: &AnnualSummary) -> Result<()> {
    let mut writer = open_writer(path)?;
    writer.write_record(SUMMARY_COLUMNS)?;
    writer.write_record([
        summary.year.to_string(),
        format_money(summary.dividend_gross_eur),
        format_money(summary.foreign_tax_eur),
        format_money(summary.dividend_net_eur),
        format_money(summary.realized_gainloss_eur),
    ])?;
    writer.flush()?;
    info!("Wrote {:?}", path);
    Ok(())
}

/// One row per symbol; rows without a symbol are written with an empty one
pub fn write_breakdown(path: &Path, rows: &[SymbolAggregate]) -> Result<()> {
    let mut writer = open_writer(path)?;
    writer.write_record(BREAKDOWN_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.symbol.clone().unwrap_or_default(),
            format_money(row.dividend_gross_eur),
            format_money(row.foreign_tax_eur),
            format_money(row.dividend_net_eur),
            format_money(row.realized_gainloss_eur),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {:?} ({} symbols)", path, rows.len());
    Ok(())
}

pub fn write_modelo_720(path: &Path, rows: &[Modelo720Row]) -> Result<()> {
    let mut writer = open_writer(path)?;
    writer.write_record(MODELO_720_COLUMNS)?;
    for row in rows {
        let valuation = row.value_eur.map(format_money).unwrap_or_default();
        writer.write_record([
            DECLARANT_CONDITION,
            ASSET_TYPE,
            ASSET_SUBTYPE,
            row.isin.as_str(),
            row.description.as_str(),
            CUSTODIAN_COUNTRY,
            ORIGIN,
            row.quantity.as_str(),
            valuation.as_str(),
            OWNERSHIP_PERCENT,
            row.domicile.as_str(),
            row.city.as_str(),
            row.fiscal_country.as_str(),
            "",
        ])?;
    }
    writer.flush()?;
    info!("Wrote {:?} ({} holdings)", path, rows.len());
    Ok(())
}
