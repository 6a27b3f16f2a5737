// FX module - ECB USD/EUR reference rates, per-year cache and daily calendar

pub mod cache;
pub mod calendar;
pub mod convert;
pub mod source;

use chrono::NaiveDate;
use rust_decimal::Decimal;

pub use cache::RateCache;
pub use calendar::DenseRateCalendar;
pub use convert::{to_eur, to_eur_all};
pub use source::{EcbRateSource, RateSource};

/// One published ECB reference rate (USD per 1 EUR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateObservation {
    pub date: NaiveDate,
    pub usd_per_eur: Decimal,
}

/// Sparse, date-ordered rate observations (trading days only)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRateSeries {
    observations: Vec<RateObservation>,
}

impl RawRateSeries {
    /// Build a series, sorting by date. A later duplicate date replaces an
    /// earlier one.
    pub fn new(mut observations: Vec<RateObservation>) -> Self {
        observations.sort_by_key(|o| o.date);
        observations.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                earlier.usd_per_eur = later.usd_per_eur;
                true
            } else {
                false
            }
        });
        Self { observations }
    }

    pub fn observations(&self) -> &[RateObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}
