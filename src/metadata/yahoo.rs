use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{normalize_country_code, RemoteMetadataSource, TickerMetadata};

const PROFILE_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const ISIN_SEARCH_URL: &str =
    "https://markets.businessinsider.com/ajax/SearchController_Suggest?max_results=25&query=";

/// Yahoo Finance quoteSummary response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    address1: Option<String>,
    address2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

impl AssetProfile {
    /// Street lines joined, followed by city, state, zip and country
    fn domicile(&self) -> String {
        [
            &self.address1,
            &self.address2,
            &self.city,
            &self.state,
            &self.zip,
            &self.country,
        ]
        .iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Issuer profile from Yahoo Finance, ISIN from the Business Insider
/// instrument search
pub struct YahooMetadataSource {
    client: Client,
}

impl YahooMetadataSource {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; DecRenta/1.0)")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn fetch_profile(&self, ticker: &str) -> Result<AssetProfile> {
        let url = format!("{}/{}?modules=assetProfile", PROFILE_URL, ticker);
        debug!("Fetching asset profile: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .context("Failed to send request to Yahoo Finance")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Yahoo Finance returned error status: {}",
                response.status()
            ));
        }

        let data: QuoteSummaryResponse = response
            .json()
            .context("Failed to parse Yahoo Finance response")?;
        parse_profile(data)
    }

    fn fetch_isin(&self, ticker: &str) -> Result<String> {
        let url = format!("{}{}", ISIN_SEARCH_URL, ticker);
        let response = self
            .client
            .get(&url)
            .send()
            .context("Failed to send ISIN search request")?;
        if !response.status().is_success() {
            return Err(anyhow!("ISIN search returned error status: {}", response.status()));
        }
        let body = response.text().context("Failed to read ISIN search response")?;
        Ok(extract_isin(&body, ticker).unwrap_or_default())
    }
}

impl RemoteMetadataSource for YahooMetadataSource {
    fn lookup(&self, ticker: &str) -> Result<TickerMetadata> {
        info!("Fetching issuer metadata for {}", ticker);

        let isin = match self.fetch_isin(ticker) {
            Ok(isin) => isin,
            Err(e) => {
                debug!("ISIN search failed for {}: {:#}", ticker, e);
                String::new()
            }
        };
        let profile = self.fetch_profile(ticker)?;

        Ok(TickerMetadata {
            ticker: ticker.to_string(),
            isin,
            domicile: profile.domicile(),
            city: profile.city.clone().unwrap_or_default(),
            country: normalize_country_code(profile.country.as_deref().unwrap_or("")),
        })
    }
}

fn parse_profile(data: QuoteSummaryResponse) -> Result<AssetProfile> {
    if let Some(error) = data.quote_summary.error {
        return Err(anyhow!(
            "Yahoo Finance API error: {} - {}",
            error.code,
            error.description
        ));
    }
    data.quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.asset_profile)
        .ok_or_else(|| anyhow!("No asset profile returned from Yahoo Finance"))
}

/// Search results list entries as `"TICKER|ISIN|..."`; the first entry for
/// the exact ticker wins
fn extract_isin(body: &str, ticker: &str) -> Option<String> {
    let pattern = format!(r"{}\|([A-Z]{{2}}[A-Z0-9]{{9}}[0-9])\|", regex::escape(ticker));
    let re = Regex::new(&pattern).ok()?;
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
