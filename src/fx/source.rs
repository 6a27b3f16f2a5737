//! ECB USD/EUR daily reference rate source
//!
//! Fetches the `EXR/D.USD.EUR.SP00.A` series as CSV from the ECB data API.
//! The response carries one row per trading day with `TIME_PERIOD` and
//! `OBS_VALUE` columns; everything else is ignored.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info};

use super::{RateObservation, RawRateSeries};
use crate::config::FxConfig;
use crate::error::{Result, TaxError};

const ECB_USD_EUR_SERIES: &str = "EXR/D.USD.EUR.SP00.A";

/// Anything that can produce a raw USD/EUR series for a date range
pub trait RateSource {
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawRateSeries>;
}

/// Blocking HTTP client for the ECB data API
pub struct EcbRateSource {
    client: Client,
    base_url: String,
}

impl EcbRateSource {
    pub fn new(config: &FxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TaxError::UpstreamUnavailable {
                url: config.ecb_base_url.clone(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.ecb_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn series_url(&self, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/{}?startPeriod={}&endPeriod={}&format=csvdata",
            self.base_url,
            ECB_USD_EUR_SERIES,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }
}

impl RateSource for EcbRateSource {
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<RawRateSeries> {
        let url = self.series_url(start, end);
        info!("Fetching ECB USD/EUR rates from {} to {}", start, end);

        let unavailable = |reason: String| TaxError::UpstreamUnavailable {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "ECB returned error status: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .map_err(|e| unavailable(format!("failed to read response body: {}", e)))?;

        let series = parse_ecb_csv(&body, "ECB response")?;
        debug!("Fetched {} ECB observations", series.len());
        Ok(series)
    }
}

/// Parse an ECB `csvdata` payload into a raw series.
///
/// Rows with a blank or non-numeric `OBS_VALUE` are dropped. Fails when the
/// required columns are missing, a date is unparseable, a rate is not
/// positive, or no usable row remains.
pub fn parse_ecb_csv(content: &str, source_name: &str) -> Result<RawRateSeries> {
    parse_rate_csv(content, source_name, "TIME_PERIOD", "OBS_VALUE")
}

fn parse_rate_csv(
    content: &str,
    source_name: &str,
    date_column: &str,
    rate_column: &str,
) -> Result<RawRateSeries> {
    let malformed = |reason: String| TaxError::MalformedResponse {
        source_name: source_name.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| malformed(format!("unreadable header: {}", e)))?
        .clone();

    let date_idx = find_header(&headers, date_column)
        .ok_or_else(|| malformed(format!("missing column {}", date_column)))?;
    let rate_idx = find_header(&headers, rate_column)
        .ok_or_else(|| malformed(format!("missing column {}", rate_column)))?;

    let mut observations = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| malformed(format!("row {}: {}", idx + 2, e)))?;
        let date_str = record.get(date_idx).unwrap_or("").trim();
        let rate_str = record.get(rate_idx).unwrap_or("").trim();

        if date_str.is_empty() || rate_str.is_empty() {
            continue;
        }
        let usd_per_eur = match Decimal::from_str(rate_str) {
            Ok(rate) => rate,
            Err(_) => {
                debug!("Dropping non-numeric rate '{}' on {}", rate_str, date_str);
                continue;
            }
        };
        if usd_per_eur <= Decimal::ZERO {
            return Err(malformed(format!(
                "non-positive rate {} on {}",
                usd_per_eur, date_str
            )));
        }
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| malformed(format!("invalid date '{}'", date_str)))?;

        observations.push(RateObservation { date, usd_per_eur });
    }

    if observations.is_empty() {
        return Err(malformed("no usable rate rows".to_string()));
    }

    Ok(RawRateSeries::new(observations))
}

fn find_header(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ECB_SAMPLE: &str = "\
KEY,FREQ,CURRENCY,CURRENCY_DENOM,EXR_TYPE,EXR_SUFFIX,TIME_PERIOD,OBS_VALUE,OBS_STATUS
EXR.D.USD.EUR.SP00.A,D,USD,EUR,SP00,A,2023-01-02,1.0683,A
EXR.D.USD.EUR.SP00.A,D,USD,EUR,SP00,A,2023-01-03,1.0545,A
EXR.D.USD.EUR.SP00.A,D,USD,EUR,SP00,A,2023-01-04,,A
EXR.D.USD.EUR.SP00.A,D,USD,EUR,SP00,A,2023-01-05,1.0599,A
";

    fn should_skip_online_tests() -> bool {
        std::env::var("DEC_RENTA_SKIP_ONLINE_TESTS")
            .map(|v| v != "0")
            .unwrap_or(false)
    }

    #[test]
    fn test_parse_ecb_csv_drops_blank_values() {
        let series = parse_ecb_csv(ECB_SAMPLE, "test").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.observations()[0].usd_per_eur, dec!(1.0683));
        assert_eq!(
            series.last_date(),
            NaiveDate::from_ymd_opt(2023, 1, 5)
        );
    }

    #[test]
    fn test_parse_ecb_csv_missing_column_is_malformed() {
        let err = parse_ecb_csv("DATE,VALUE\n2023-01-02,1.06\n", "test").unwrap_err();
        assert!(matches!(err, TaxError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_ecb_csv_without_rows_is_malformed() {
        let err = parse_ecb_csv("TIME_PERIOD,OBS_VALUE\n2023-01-02,\n", "test").unwrap_err();
        assert!(matches!(err, TaxError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_ecb_csv_rejects_zero_rate() {
        let err = parse_ecb_csv("TIME_PERIOD,OBS_VALUE\n2023-01-02,0\n", "test").unwrap_err();
        assert!(err.to_string().contains("non-positive"));
    }

    #[test]
    fn test_series_url_contains_range() {
        let source = EcbRateSource::new(&FxConfig::default()).unwrap();
        let url = source.series_url(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        );
        assert!(url.ends_with(
            "/EXR/D.USD.EUR.SP00.A?startPeriod=2023-01-01&endPeriod=2023-12-31&format=csvdata"
        ));
    }

    #[test]
    fn test_unreachable_endpoint_is_upstream_unavailable() {
        let config = FxConfig {
            ecb_base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..FxConfig::default()
        };
        let source = EcbRateSource::new(&config).unwrap();
        let err = source
            .fetch(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, TaxError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_fetch_ecb_january() {
        if should_skip_online_tests() {
            return;
        }

        let source = EcbRateSource::new(&FxConfig::default()).unwrap();
        let result = source.fetch(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        );
        let series = match result {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping ECB fetch test: {}", e);
                return;
            }
        };
        assert!(series.len() >= 20);
        assert!(series.observations().iter().all(|o| o.usd_per_eur > Decimal::ZERO));
    }
}
