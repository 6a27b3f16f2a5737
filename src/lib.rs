//! dec-renta - Spanish tax return helper for US brokerage accounts
//!
//! Converts Schwab exports to EUR with the ECB USD/EUR reference rate in
//! force on each transaction date, and produces the figures for the annual
//! income tax return (Modelo 100) and a draft of the foreign securities
//! declaration (Modelo 720).

pub mod config;
pub mod error;
pub mod fx;
pub mod importers;
pub mod metadata;
pub mod report;
pub mod utils;

pub use error::{Result, TaxError};
