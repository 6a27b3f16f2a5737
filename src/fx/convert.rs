use rust_decimal::Decimal;

use crate::error::{Result, TaxError};

/// Convert a USD amount to EUR given the ECB rate (USD per 1 EUR).
pub fn to_eur(amount_usd: Decimal, usd_per_eur: Decimal) -> Result<Decimal> {
    if usd_per_eur <= Decimal::ZERO {
        return Err(TaxError::InvalidRate { rate: usd_per_eur });
    }
    amount_usd
        .checked_div(usd_per_eur)
        .ok_or(TaxError::ConversionOverflow {
            amount: amount_usd,
            rate: usd_per_eur,
        })
}

/// Element-wise [`to_eur`] over `(amount, rate)` pairs.
pub fn to_eur_all<I>(pairs: I) -> Result<Vec<Decimal>>
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    pairs
        .into_iter()
        .map(|(amount, rate)| to_eur(amount, rate))
        .collect()
}
