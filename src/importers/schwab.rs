//! Schwab CSV export parsers
//!
//! Three exports are understood: account transactions, realized gain/loss
//! details and year-end positions. Amounts come as `"$1,234.56"` or
//! `"-$12.34"`; dates as `MM/DD/YYYY`, sometimes followed by `as of ...`.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use encoding_rs::UTF_8;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::{PositionRecord, RealizedRecord, RealizedTable, TransactionRecord};
use crate::report::dictionary::{GAIN_LOSS_COLUMNS, NUMERIC_COLUMNS};

/// Raw table: trimmed header names and string rows
struct Table {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str, path: &Path) -> Result<usize> {
        self.column(name).ok_or_else(|| {
            anyhow!(
                "Missing column '{}' in {:?}. Available: {:?}",
                name,
                path,
                self.headers
            )
        })
    }
}

/// Parse the transactions export (header on the first line)
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRecord>> {
    let path = path.as_ref();
    info!("Parsing transactions file: {:?}", path);
    let table = read_table(path, 0)?;

    let date_idx = table.require("Date", path)?;
    let action_idx = table.require("Action", path)?;
    let symbol_idx = table.require("Symbol", path)?;
    let amount_idx = table.require("Amount", path)?;

    let records: Vec<TransactionRecord> = table
        .rows
        .iter()
        .map(|row| TransactionRecord {
            date: parse_broker_date(field(row, date_idx)),
            action: field(row, action_idx).to_string(),
            symbol: non_empty(field(row, symbol_idx)),
            amount: parse_dollar_amount(field(row, amount_idx)),
        })
        .collect();

    debug!("Parsed {} transaction rows", records.len());
    Ok(records)
}

/// Parse the realized gain/loss export (one title line before the header)
pub fn load_realized<P: AsRef<Path>>(path: P) -> Result<RealizedTable> {
    let path = path.as_ref();
    info!("Parsing realized gain/loss file: {:?}", path);
    let table = read_table(path, 1)?;

    let closed_idx = table.require("Closed Date", path)?;
    let symbol_idx = table.require("Symbol", path)?;

    let numeric: Vec<(String, usize)> = NUMERIC_COLUMNS
        .iter()
        .chain(GAIN_LOSS_COLUMNS.iter())
        .filter_map(|name| table.column(name).map(|idx| (name.to_string(), idx)))
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let values: HashMap<String, Option<Decimal>> = numeric
                .iter()
                .map(|(name, idx)| (name.clone(), parse_dollar_amount(field(row, *idx))))
                .collect();
            RealizedRecord {
                closed_date: parse_broker_date(field(row, closed_idx)),
                symbol: non_empty(field(row, symbol_idx)),
                values,
            }
        })
        .collect::<Vec<_>>();

    debug!("Parsed {} realized rows", rows.len());
    Ok(RealizedTable {
        columns: table.headers,
        rows,
    })
}

/// Parse the positions export (two preamble lines before the header)
pub fn load_positions<P: AsRef<Path>>(path: P) -> Result<Vec<PositionRecord>> {
    let path = path.as_ref();
    info!("Parsing positions file: {:?}", path);
    let table = read_table(path, 2)?;

    let ticker_idx = table.require("Symbol", path)?;
    let description_idx = table.require("Description", path)?;
    let qty_idx = table
        .column("Qty (Quantity)")
        .or_else(|| table.column("Qty"))
        .ok_or_else(|| anyhow!("Missing quantity column in {:?}", path))?;
    let value_idx = table
        .column("Mkt Val (Market Value)")
        .or_else(|| table.column("Market Value"))
        .ok_or_else(|| anyhow!("Missing market value column in {:?}", path))?;

    let positions: Vec<PositionRecord> = table
        .rows
        .iter()
        .map(|row| PositionRecord {
            ticker: field(row, ticker_idx).to_string(),
            description: field(row, description_idx).to_string(),
            quantity: field(row, qty_idx).to_string(),
            market_value: parse_dollar_amount(field(row, value_idx)),
        })
        .collect();

    debug!("Parsed {} position rows", positions.len());
    Ok(positions)
}

fn read_table(path: &Path, skip_lines: usize) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let (decoded, _, had_errors) = UTF_8.decode(&bytes);
    if had_errors {
        debug!("Replaced invalid UTF-8 sequences in {:?}", path);
    }

    let mut content: &str = &decoded;
    for _ in 0..skip_lines {
        content = match content.find('\n') {
            Some(pos) => &content[pos + 1..],
            None => "",
        };
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV headers of {:?}", path))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read row {} of {:?}", idx + skip_lines + 2, path))?;
        rows.push(record);
    }

    Ok(Table { headers, rows })
}

fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `MM/DD/YYYY`, ignoring any trailing `as of MM/DD/YYYY`
pub fn parse_broker_date(text: &str) -> Option<NaiveDate> {
    let first = text.split_whitespace().next()?;
    NaiveDate::parse_from_str(first, "%m/%d/%Y").ok()
}

/// `$1,234.56` / `-$12.34` / `1234.5`; anything else is `None`
pub fn parse_dollar_amount(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(['$', ','], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
}
