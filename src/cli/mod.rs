use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use dec_renta::importers::inputs::{
    DEFAULT_POSITIONS_PATTERN, DEFAULT_REALIZED_PATTERN, DEFAULT_TRANSACTIONS_PATTERN,
};

pub mod formatters;

#[derive(Parser)]
#[command(name = "dec-renta")]
#[command(
    version,
    about = "Spanish tax return helper for US brokerage accounts (Modelo 100 / Modelo 720)"
)]
#[command(
    long_about = "Convert Schwab exports to EUR with the ECB reference rate of each transaction date and write draft figures for the income tax return (Modelo 100) and the foreign assets declaration (Modelo 720)."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./dec-renta.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dividends, foreign withholding and realized gains in EUR (Modelo 100)
    #[command(name = "modelo-100")]
    Modelo100 {
        #[command(subcommand)]
        action: Modelo100Commands,
    },

    /// Year-end foreign securities valued in EUR (Modelo 720)
    #[command(name = "modelo-720")]
    Modelo720 {
        #[command(subcommand)]
        action: Modelo720Commands,
    },

    /// ECB USD/EUR reference rates
    Fx {
        #[command(subcommand)]
        action: FxCommands,
    },
}

/// Options shared by both report commands
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory with the broker exports
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Output directory (defaults to the configured one, then ./out)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Fiscal year (inferred from the file names when omitted)
    #[arg(long)]
    pub year: Option<i32>,

    /// Download the year's rates again even if cached
    #[arg(long)]
    pub refresh_fx: bool,
}

#[derive(Subcommand)]
pub enum Modelo100Commands {
    /// Write resumen_anual_<year>.csv and desglose_symbol_<year>.csv
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// File name pattern of the transactions export
        #[arg(long, default_value = DEFAULT_TRANSACTIONS_PATTERN)]
        pattern_transactions: String,

        /// File name pattern of the realized gain/loss export
        #[arg(long, default_value = DEFAULT_REALIZED_PATTERN)]
        pattern_realized: String,
    },
}

#[derive(Subcommand)]
pub enum Modelo720Commands {
    /// Write modelo_720_<year>.csv
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// File name pattern of the year-end positions export
        #[arg(long, default_value = DEFAULT_POSITIONS_PATTERN)]
        pattern_positions: String,

        /// Ticker metadata file (ISIN, issuer domicile)
        #[arg(long, value_name = "FILE")]
        metadata_file: Option<PathBuf>,

        /// Use only the local metadata file
        #[arg(long)]
        no_remote_metadata: bool,
    },
}

#[derive(Subcommand)]
pub enum FxCommands {
    /// Show the cached series and month-end rates for a year
    Show {
        /// Year (e.g., 2023)
        year: i32,

        /// Download the year again even if cached
        #[arg(long)]
        refresh: bool,
    },

    /// Remove cached rate files
    ClearCache {
        /// Only this year
        #[arg(long)]
        year: Option<i32>,
    },
}
