// Import module - broker CSV exports and input file resolution

pub mod inputs;
pub mod schwab;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub use inputs::{resolve_inputs, resolve_positions_inputs, DataInputs, Inputs720};
pub use schwab::{load_positions, load_realized, load_transactions};

/// One row of the account transactions export
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub date: Option<NaiveDate>,
    pub action: String,
    pub symbol: Option<String>,
    pub amount: Option<Decimal>,
}

/// One closed lot of the realized gain/loss export
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedRecord {
    pub closed_date: Option<NaiveDate>,
    pub symbol: Option<String>,
    pub values: HashMap<String, Option<Decimal>>,
}

impl RealizedRecord {
    /// Numeric value of `column`; blank or unparseable cells are `None`
    pub fn value(&self, column: &str) -> Option<Decimal> {
        self.values.get(column).copied().flatten()
    }
}

/// Realized gain/loss rows together with the header names of the export
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RealizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<RealizedRecord>,
}

/// One year-end holding of the positions export
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub ticker: String,
    pub description: String,
    pub quantity: String,
    pub market_value: Option<Decimal>,
}
