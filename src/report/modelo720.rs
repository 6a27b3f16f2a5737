//! Foreign securities declaration rows (Modelo 720, asset class V)

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::aggregate::PositionValuation;
use crate::metadata::MetadataTable;

/// Declarant is the holder
pub const DECLARANT_CONDITION: &str = "1";
/// Securities and shares
pub const ASSET_TYPE: &str = "V";
pub const ASSET_SUBTYPE: &str = "1";
pub const CUSTODIAN_COUNTRY: &str = "US";
/// Acquired during or before the year
pub const ORIGIN: &str = "A";
pub const OWNERSHIP_PERCENT: &str = "100";
pub const DEFAULT_FISCAL_COUNTRY: &str = "US";

pub const MODELO_720_COLUMNS: [&str; 14] = [
    "Clave de condicion del declarante",
    "Clave de tipo de bien o derecho",
    "Subclave de bien o derecho",
    "Identificacion de valores",
    "Descripcion",
    "Codigo de pais (custodio)",
    "Origen del bien o derecho",
    "Numero de valores",
    "Valoracion uno",
    "Porcentaje de participacion",
    "Domicilio fiscal",
    "Poblacion",
    "Pais, dom. fiscal",
    "Fecha Venta (si procede)",
];

/// One declared holding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modelo720Row {
    pub ticker: String,
    pub isin: String,
    pub description: String,
    pub quantity: String,
    pub value_usd: Option<Decimal>,
    pub value_eur: Option<Decimal>,
    pub valuation_date: NaiveDate,
    pub domicile: String,
    pub city: String,
    pub fiscal_country: String,
}

/// Join valued positions with issuer metadata, keeping position order.
/// Tickers without metadata get blank issuer fields and a `US` fiscal
/// country.
pub fn build_rows(positions: &[PositionValuation], metadata: &MetadataTable) -> Vec<Modelo720Row> {
    positions
        .iter()
        .map(|p| {
            let meta = metadata.get(&p.ticker).cloned().unwrap_or_default();
            let country = meta.country.trim();
            Modelo720Row {
                ticker: p.ticker.clone(),
                isin: meta.isin.trim().to_string(),
                description: p.description.clone(),
                quantity: p.quantity.clone(),
                value_usd: p.market_value_usd,
                value_eur: p.value_eur,
                valuation_date: p.valuation_date,
                domicile: meta.domicile.trim().to_string(),
                city: meta.city.trim().to_string(),
                fiscal_country: if country.is_empty() {
                    DEFAULT_FISCAL_COUNTRY.to_string()
                } else {
                    country.to_string()
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TickerMetadata;
    use rust_decimal_macros::dec;

    fn position(ticker: &str, value: Option<Decimal>) -> PositionValuation {
        PositionValuation {
            ticker: ticker.to_string(),
            description: format!("{} INC", ticker),
            quantity: "10".to_string(),
            market_value_usd: value,
            value_eur: value,
            valuation_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_rows_join_metadata_and_default_country() {
        let mut table = MetadataTable::default();
        table.insert(TickerMetadata {
            ticker: "AAPL".to_string(),
            isin: "US0378331005".to_string(),
            domicile: "One Apple Park Way".to_string(),
            city: "Cupertino".to_string(),
            country: "".to_string(),
        });

        let rows = build_rows(
            &[position("AAPL", Some(dec!(100))), position("ZZZ", None)],
            &table,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].isin, "US0378331005");
        assert_eq!(rows[0].fiscal_country, "US");
        assert_eq!(rows[0].value_usd, Some(dec!(100)));
        assert_eq!(rows[0].valuation_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(rows[1].isin, "");
        assert_eq!(rows[1].domicile, "");
        assert_eq!(rows[1].fiscal_country, "US");
        assert_eq!(rows[1].value_eur, None);
    }
}
