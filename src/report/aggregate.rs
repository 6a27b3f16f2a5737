//! Aggregation engine: dividends, withholding and realized gains per symbol
//!
//! Every amount is converted from USD with the calendar's rate for the row's
//! own date; positions use the single Dec 31 rate. Rows dated outside the
//! fiscal year, or without a parseable date, never reach a rate lookup.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::dictionary::{classify_action, find_gain_loss_column, ActionClass};
use crate::error::{Result, TaxError};
use crate::fx::cache::year_bounds;
use crate::fx::{to_eur, DenseRateCalendar};
use crate::importers::{PositionRecord, RealizedTable, TransactionRecord};

/// Grouping key: the ticker, or `None` for rows without one
pub type SymbolKey = Option<String>;

/// Dividend and withholding sums for one symbol (EUR, unrounded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DividendTotals {
    pub gross_eur: Decimal,
    pub foreign_tax_eur: Decimal,
}

impl DividendTotals {
    /// Withholding is stored negative, so net is a sum
    pub fn net_eur(&self) -> Decimal {
        self.gross_eur + self.foreign_tax_eur
    }
}

/// One row of the per-symbol breakdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAggregate {
    pub symbol: SymbolKey,
    pub dividend_gross_eur: Decimal,
    pub foreign_tax_eur: Decimal,
    pub dividend_net_eur: Decimal,
    pub realized_gainloss_eur: Decimal,
}

/// Totals across all symbols for the fiscal year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnualSummary {
    pub year: i32,
    pub dividend_gross_eur: Decimal,
    pub foreign_tax_eur: Decimal,
    pub dividend_net_eur: Decimal,
    pub realized_gainloss_eur: Decimal,
}

/// A year-end holding valued in EUR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionValuation {
    pub ticker: String,
    pub description: String,
    pub quantity: String,
    pub market_value_usd: Option<Decimal>,
    pub value_eur: Option<Decimal>,
    pub valuation_date: NaiveDate,
}

pub struct AggregationEngine<'a> {
    calendar: &'a DenseRateCalendar,
}

impl<'a> AggregationEngine<'a> {
    pub fn new(calendar: &'a DenseRateCalendar) -> Self {
        Self { calendar }
    }

    pub fn year(&self) -> i32 {
        self.calendar.year()
    }

    fn in_year(&self, date: Option<NaiveDate>) -> Option<NaiveDate> {
        date.filter(|d| d.year() == self.year())
    }

    fn convert(&self, amount_usd: Decimal, date: NaiveDate) -> Result<Decimal> {
        let rate = self.calendar.rate_on(date)?;
        to_eur(amount_usd, rate)
    }

    /// Sum dividend and withholding rows per symbol, in EUR.
    ///
    /// Rows whose action is in neither list are ignored. A symbol with only
    /// withholding rows gets zero gross, and vice versa.
    pub fn aggregate_dividends(
        &self,
        records: &[TransactionRecord],
    ) -> Result<BTreeMap<SymbolKey, DividendTotals>> {
        let mut totals: BTreeMap<SymbolKey, DividendTotals> = BTreeMap::new();
        let mut skipped_out_of_year = 0usize;

        for record in records {
            let class = classify_action(&record.action);
            if class == ActionClass::Other {
                continue;
            }
            let Some(date) = self.in_year(record.date) else {
                skipped_out_of_year += 1;
                continue;
            };

            let entry = totals.entry(record.symbol.clone()).or_default();
            let Some(amount) = record.amount else {
                debug!("{:?} row on {} has no amount", record.symbol, date);
                continue;
            };
            let amount_eur = self.convert(amount, date)?;
            match class {
                ActionClass::Dividend => entry.gross_eur += amount_eur,
                ActionClass::ForeignTax => entry.foreign_tax_eur += amount_eur,
                ActionClass::Other => {}
            }
        }

        debug!(
            "Aggregated dividends for {} symbols ({} rows outside {})",
            totals.len(),
            skipped_out_of_year,
            self.year()
        );
        Ok(totals)
    }

    /// Sum realized gain/loss per symbol, in EUR, using the rate on each
    /// lot's closed date.
    ///
    /// The gain/loss column is the first present from the priority list.
    pub fn aggregate_realized(&self, table: &RealizedTable) -> Result<BTreeMap<SymbolKey, Decimal>> {
        let column = find_gain_loss_column(&table.columns).ok_or_else(|| {
            TaxError::NoGainLossColumn {
                available: table.columns.clone(),
            }
        })?;
        debug!("Using realized gain/loss column '{}'", column);

        let mut totals: BTreeMap<SymbolKey, Decimal> = BTreeMap::new();
        for row in &table.rows {
            let Some(closed) = self.in_year(row.closed_date) else {
                continue;
            };
            let entry = totals.entry(row.symbol.clone()).or_default();
            if let Some(value) = row.value(column) {
                *entry += self.convert(value, closed)?;
            }
        }
        Ok(totals)
    }

    /// Value holdings at the Dec 31 rate.
    ///
    /// Only tickers of at most five characters are kept; longer labels are
    /// the export's cash and account-total lines. Sorted by ticker.
    pub fn value_positions(&self, positions: &[PositionRecord]) -> Result<Vec<PositionValuation>> {
        let rate = self.calendar.year_end_rate()?;
        let (_, valuation_date) = year_bounds(self.year())?;

        let mut valued = positions
            .iter()
            .filter(|p| is_security_ticker(&p.ticker))
            .map(|p| -> Result<PositionValuation> {
                let value_eur = p.market_value.map(|v| to_eur(v, rate)).transpose()?;
                Ok(PositionValuation {
                    ticker: p.ticker.clone(),
                    description: p.description.clone(),
                    quantity: p.quantity.clone(),
                    market_value_usd: p.market_value,
                    value_eur,
                    valuation_date,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        valued.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        debug!("Valued {} positions at {} USD/EUR", valued.len(), rate);
        Ok(valued)
    }
}

fn is_security_ticker(ticker: &str) -> bool {
    let ticker = ticker.trim();
    !ticker.is_empty() && ticker.chars().count() <= 5
}

/// Outer join of dividend and gain/loss sums on symbol, sorted by symbol.
///
/// A symbol missing from one side gets zeros for that side.
pub fn join_by_symbol(
    dividends: &BTreeMap<SymbolKey, DividendTotals>,
    realized: &BTreeMap<SymbolKey, Decimal>,
) -> Vec<SymbolAggregate> {
    let symbols: BTreeSet<&SymbolKey> = dividends.keys().chain(realized.keys()).collect();

    symbols
        .into_iter()
        .map(|symbol| {
            let div = dividends.get(symbol).copied().unwrap_or_default();
            SymbolAggregate {
                symbol: symbol.clone(),
                dividend_gross_eur: div.gross_eur,
                foreign_tax_eur: div.foreign_tax_eur,
                dividend_net_eur: div.net_eur(),
                realized_gainloss_eur: realized.get(symbol).copied().unwrap_or_default(),
            }
        })
        .collect()
}

pub fn annual_summary(
    year: i32,
    dividends: &BTreeMap<SymbolKey, DividendTotals>,
    realized: &BTreeMap<SymbolKey, Decimal>,
) -> AnnualSummary {
    let gross: Decimal = dividends.values().map(|d| d.gross_eur).sum();
    let tax: Decimal = dividends.values().map(|d| d.foreign_tax_eur).sum();
    AnnualSummary {
        year,
        dividend_gross_eur: gross,
        foreign_tax_eur: tax,
        dividend_net_eur: gross + tax,
        realized_gainloss_eur: realized.values().copied().sum(),
    }
}
