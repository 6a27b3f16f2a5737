//! Rounding and formatting of monetary amounts
//!
//! Internal sums keep full precision; rounding to cents happens only when a
//! value leaves the engine (report files and terminal tables).

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency suffix for terminal formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Append " €" (Spanish convention)
    EUR,
    /// Append " $"
    USD,
}

/// Round to cents, half to even.
///
/// ```
/// use dec_renta::utils::round_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_money(dec!(0.125)), dec!(0.12));
/// assert_eq!(round_money(dec!(0.135)), dec!(0.14));
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Rounded amount with exactly two decimals and `.` separator, as written to
/// report CSV files: `"1234.50"`, `"-7.14"`, `"0.00"`.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = round_money(value);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    rounded.rescale(2);
    rounded.to_string()
}

/// Formats a Decimal value using Spanish locale conventions:
/// - Thousands separator: `.` (period)
/// - Decimal separator: `,` (comma)
///
/// # Examples
/// ```
/// use dec_renta::utils::{format_currency, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56), CurrencySymbol::EUR), "1.234,56 €");
/// assert_eq!(format_currency(dec!(1234), CurrencySymbol::USD), "1.234,00 $");
/// ```
pub fn format_currency(value: Decimal, symbol: CurrencySymbol) -> String {
    let plain = format_money(value);
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (integer_part, decimal_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec!['.', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let suffix = match symbol {
        CurrencySymbol::EUR => " €",
        CurrencySymbol::USD => " $",
    };
    format!("{}{},{}{}", sign, with_separators, decimal_part, suffix)
}

/// Format as euros: "1.234,56 €"
pub fn format_eur(value: Decimal) -> String {
    format_currency(value, CurrencySymbol::EUR)
}

/// Format as dollars: "1.234,56 $"
pub fn format_usd(value: Decimal) -> String {
    format_currency(value, CurrencySymbol::USD)
}
