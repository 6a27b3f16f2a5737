//! Output formatting module for CLI display
//!
//! Terminal tables and JSON for the report results. The CSV files written to
//! the output directory are produced by the report writers, not here.

use chrono::{Datelike, NaiveDate};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use dec_renta::fx::DenseRateCalendar;
use dec_renta::report::{IncomeReport, Modelo720Report};
use dec_renta::utils::{format_eur, format_money, format_usd};

fn colored_amount(value: Decimal) -> String {
    if value >= Decimal::ZERO {
        format_eur(value).green().to_string()
    } else {
        format_eur(value).red().to_string()
    }
}

/// Per-symbol breakdown and annual totals
pub fn format_income_table(report: &IncomeReport) -> String {
    #[derive(Tabled)]
    struct SymbolRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Gross dividends")]
        gross: String,
        #[tabled(rename = "Foreign tax")]
        tax: String,
        #[tabled(rename = "Net dividends")]
        net: String,
        #[tabled(rename = "Realized G/L")]
        gain_loss: String,
    }

    let summary = &report.summary;
    let mut output = format!(
        "\n{} Modelo 100 - {}\n\n",
        "📊".cyan().bold(),
        summary.year
    );

    if report.breakdown.is_empty() {
        output.push_str(&format!(
            "{} No dividends or realized gains in {}\n",
            "ℹ".blue().bold(),
            summary.year
        ));
    } else {
        let rows: Vec<SymbolRow> = report
            .breakdown
            .iter()
            .map(|r| SymbolRow {
                symbol: r.symbol.clone().unwrap_or_else(|| "(none)".to_string()),
                gross: format_eur(r.dividend_gross_eur),
                tax: format_eur(r.foreign_tax_eur),
                net: format_eur(r.dividend_net_eur),
                gain_loss: colored_amount(r.realized_gainloss_eur),
            })
            .collect();

        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
    }

    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<28} {}",
        "Gross dividends:".bold(),
        format_eur(summary.dividend_gross_eur)
    ));
    output.push_str(&format!(
        "\n{:<28} {}",
        "Foreign tax withheld:".bold(),
        format_eur(summary.foreign_tax_eur)
    ));
    output.push_str(&format!(
        "\n{:<28} {}",
        "Net dividends:".bold(),
        format_eur(summary.dividend_net_eur)
    ));
    output.push_str(&format!(
        "\n{:<28} {}\n",
        "Realized gain/loss:".bold(),
        colored_amount(summary.realized_gainloss_eur)
    ));
    output.push_str(&format_written_files(&[
        &report.summary_path,
        &report.breakdown_path,
    ]));

    output
}

pub fn format_income_json(report: &IncomeReport) -> String {
    #[derive(Serialize)]
    struct JsonSymbol {
        symbol: Option<String>,
        dividend_gross_eur: String,
        foreign_tax_eur: String,
        dividend_net_eur: String,
        realized_gainloss_eur: String,
    }

    #[derive(Serialize)]
    struct JsonIncome {
        year: i32,
        dividend_gross_eur: String,
        foreign_tax_eur: String,
        dividend_net_eur: String,
        realized_gainloss_eur: String,
        symbols: Vec<JsonSymbol>,
        files: Vec<String>,
    }

    let summary = &report.summary;
    let json = JsonIncome {
        year: summary.year,
        dividend_gross_eur: format_money(summary.dividend_gross_eur),
        foreign_tax_eur: format_money(summary.foreign_tax_eur),
        dividend_net_eur: format_money(summary.dividend_net_eur),
        realized_gainloss_eur: format_money(summary.realized_gainloss_eur),
        symbols: report
            .breakdown
            .iter()
            .map(|r| JsonSymbol {
                symbol: r.symbol.clone(),
                dividend_gross_eur: format_money(r.dividend_gross_eur),
                foreign_tax_eur: format_money(r.foreign_tax_eur),
                dividend_net_eur: format_money(r.dividend_net_eur),
                realized_gainloss_eur: format_money(r.realized_gainloss_eur),
            })
            .collect(),
        files: vec![
            report.summary_path.display().to_string(),
            report.breakdown_path.display().to_string(),
        ],
    };

    serde_json::to_string_pretty(&json)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Declared holdings with the fields most often left blank highlighted
pub fn format_720_table(report: &Modelo720Report) -> String {
    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "ISIN")]
        isin: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Value (USD)")]
        value_usd: String,
        #[tabled(rename = "Value (EUR)")]
        value_eur: String,
        #[tabled(rename = "Country")]
        country: String,
    }

    let mut output = format!(
        "\n{} Modelo 720 - {}\n\n",
        "📊".cyan().bold(),
        report.year
    );

    if report.rows.is_empty() {
        output.push_str(&format!("{} No holdings found\n", "ℹ".blue().bold()));
        output.push_str(&format_written_files(&[&report.path]));
        return output;
    }

    let rows: Vec<HoldingRow> = report
        .rows
        .iter()
        .map(|r| HoldingRow {
            ticker: r.ticker.clone(),
            isin: if r.isin.is_empty() {
                "missing".yellow().to_string()
            } else {
                r.isin.clone()
            },
            quantity: r.quantity.clone(),
            value_usd: r
                .value_usd
                .map(format_usd)
                .unwrap_or_else(|| "N/A".to_string()),
            value_eur: r
                .value_eur
                .map(format_eur)
                .unwrap_or_else(|| "N/A".to_string()),
            country: r.fiscal_country.clone(),
        })
        .collect();

    if let Some(first) = report.rows.first() {
        output.push_str(&format!(
            "{:<20} {}\n\n",
            "Valued at:".bold(),
            first.valuation_date.format("%d/%m/%Y")
        ));
    }

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..5), Alignment::right());
    output.push_str(&table.to_string());

    let total: Decimal = report.rows.iter().filter_map(|r| r.value_eur).sum();
    output.push_str(&format!(
        "\n\n{:<20} {}\n",
        "Total value:".bold(),
        format_eur(total)
    ));

    let missing = report.rows.iter().filter(|r| r.isin.is_empty()).count();
    if missing > 0 {
        output.push_str(&format!(
            "{} {} holdings without ISIN; complete the metadata file before filing\n",
            "⚠".yellow().bold(),
            missing
        ));
    }
    output.push_str(&format_written_files(&[&report.path]));

    output
}

pub fn format_720_json(report: &Modelo720Report) -> String {
    #[derive(Serialize)]
    struct JsonHolding {
        ticker: String,
        isin: String,
        description: String,
        quantity: String,
        value_usd: Option<String>,
        value_eur: Option<String>,
        valuation_date: String,
        domicile: String,
        city: String,
        fiscal_country: String,
    }

    #[derive(Serialize)]
    struct Json720 {
        year: i32,
        holdings: Vec<JsonHolding>,
        file: String,
    }

    let json = Json720 {
        year: report.year,
        holdings: report
            .rows
            .iter()
            .map(|r| JsonHolding {
                ticker: r.ticker.clone(),
                isin: r.isin.clone(),
                description: r.description.clone(),
                quantity: r.quantity.clone(),
                value_usd: r.value_usd.map(format_money),
                value_eur: r.value_eur.map(format_money),
                valuation_date: r.valuation_date.format("%Y-%m-%d").to_string(),
                domicile: r.domicile.clone(),
                city: r.city.clone(),
                fiscal_country: r.fiscal_country.clone(),
            })
            .collect(),
        file: report.path.display().to_string(),
    };

    serde_json::to_string_pretty(&json)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Coverage of a year's calendar and the rate in force at each month end
pub fn format_rates_table(calendar: &DenseRateCalendar, cache_path: &Path) -> String {
    #[derive(Tabled)]
    struct MonthRow {
        #[tabled(rename = "Month end")]
        date: String,
        #[tabled(rename = "USD per EUR")]
        rate: String,
    }

    let mut output = format!(
        "\n{} ECB USD/EUR reference rates - {}\n\n",
        "💱".cyan().bold(),
        calendar.year()
    );

    let covered = calendar.iter().filter(|(_, rate)| rate.is_some()).count();
    output.push_str(&format!("{:<20} {}\n", "Cache file:".bold(), cache_path.display()));
    output.push_str(&format!(
        "{:<20} {} of {} days\n",
        "Days with a rate:".bold(),
        covered,
        calendar.len()
    ));
    if let Some(first) = calendar.first_covered_date() {
        output.push_str(&format!("{:<20} {}\n\n", "First rate:".bold(), first));
    }

    let mut month_ends: Vec<(NaiveDate, Option<Decimal>)> = Vec::new();
    let mut days = calendar.iter().peekable();
    while let Some((date, rate)) = days.next() {
        let last_of_month = days
            .peek()
            .map_or(true, |(next, _)| next.month() != date.month());
        if last_of_month {
            month_ends.push((date, rate));
        }
    }

    let rows: Vec<MonthRow> = month_ends
        .into_iter()
        .map(|(date, rate)| MonthRow {
            date: date.format("%d/%m/%Y").to_string(),
            rate: rate
                .map(|r| r.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());
    output.push('\n');

    output
}

fn format_written_files(paths: &[&Path]) -> String {
    let mut output = String::new();
    for path in paths {
        output.push_str(&format!("{} {}\n", "✓".green().bold(), path.display()));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use dec_renta::fx::{RateObservation, RawRateSeries};
    use dec_renta::report::{AnnualSummary, Modelo720Row, SymbolAggregate};
    use rust_decimal_macros::dec;
    use std::path::PathBuf;

    fn income_report() -> IncomeReport {
        IncomeReport {
            summary: AnnualSummary {
                year: 2023,
                dividend_gross_eur: dec!(47.619),
                foreign_tax_eur: dec!(-7.142),
                dividend_net_eur: dec!(40.477),
                realized_gainloss_eur: dec!(-12.5),
            },
            breakdown: vec![SymbolAggregate {
                symbol: Some("MSFT".to_string()),
                dividend_gross_eur: dec!(47.619),
                foreign_tax_eur: dec!(-7.142),
                dividend_net_eur: dec!(40.477),
                realized_gainloss_eur: dec!(-12.5),
            }],
            summary_path: PathBuf::from("out/resumen_anual_2023.csv"),
            breakdown_path: PathBuf::from("out/desglose_symbol_2023.csv"),
        }
    }

    #[test]
    fn test_income_table_lists_symbols_and_files() {
        colored::control::set_override(false);
        let output = format_income_table(&income_report());
        assert!(output.contains("MSFT"));
        assert!(output.contains("47,62 €"));
        assert!(output.contains("-12,50 €"));
        assert!(output.contains("resumen_anual_2023.csv"));
    }

    #[test]
    fn test_income_json_uses_rounded_amounts() {
        let json: serde_json::Value =
            serde_json::from_str(&format_income_json(&income_report())).unwrap();
        assert_eq!(json["dividend_gross_eur"], "47.62");
        assert_eq!(json["symbols"][0]["symbol"], "MSFT");
        assert_eq!(json["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_720_table_flags_missing_isin() {
        colored::control::set_override(false);
        let report = Modelo720Report {
            year: 2023,
            rows: vec![Modelo720Row {
                ticker: "ZZZ".to_string(),
                isin: String::new(),
                description: "ZZZ CORP".to_string(),
                quantity: "3".to_string(),
                value_usd: Some(dec!(11.05)),
                value_eur: Some(dec!(10)),
                valuation_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                domicile: String::new(),
                city: String::new(),
                fiscal_country: "US".to_string(),
            }],
            path: PathBuf::from("out/modelo_720_2023.csv"),
        };
        let output = format_720_table(&report);
        assert!(output.contains("missing"));
        assert!(output.contains("1 holdings without ISIN"));
        assert!(output.contains("31/12/2023"));
        assert!(output.contains("11,05 $"));
    }

    #[test]
    fn test_rates_table_month_ends() {
        colored::control::set_override(false);
        let series = RawRateSeries::new(vec![RateObservation {
            date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            usd_per_eur: dec!(1.0683),
        }]);
        let calendar = DenseRateCalendar::from_series(2023, &series).unwrap();
        let output = format_rates_table(&calendar, Path::new("/tmp/fx_usd_per_eur_2023.csv"));
        assert!(output.contains("364 of 365 days"));
        assert!(output.contains("31/01/2023"));
        assert!(output.contains("31/12/2023"));
        assert!(output.contains("1.0683"));
    }
}
