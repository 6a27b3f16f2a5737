//! Daily USD/EUR calendar for one fiscal year
//!
//! ECB rates exist only for trading days. The calendar covers every date from
//! Jan 1 to Dec 31; a date without an observation takes the rate of the most
//! recent earlier observation in the same series. Dates before the first
//! observation stay empty and looking them up is an error.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use super::cache::{year_bounds, RateCache};
use super::source::RateSource;
use super::RawRateSeries;
use crate::error::{Result, TaxError};

#[derive(Debug, Clone, PartialEq)]
pub struct DenseRateCalendar {
    year: i32,
    start: NaiveDate,
    rates: Vec<Option<Decimal>>,
}

impl DenseRateCalendar {
    /// Obtain the year's raw series through the cache and forward-fill it.
    pub fn build<S: RateSource>(cache: &RateCache<S>, year: i32, refresh: bool) -> Result<Self> {
        let series = cache.get_or_fetch(year, refresh)?;
        Self::from_series(year, &series)
    }

    /// Forward-fill `series` over every calendar day of `year`.
    ///
    /// Observations outside the year are ignored.
    pub fn from_series(year: i32, series: &RawRateSeries) -> Result<Self> {
        let (start, end) = year_bounds(year)?;
        let days = (end - start).num_days() as usize + 1;

        let mut rates = Vec::with_capacity(days);
        let mut observations = series
            .observations()
            .iter()
            .filter(|o| o.date.year() == year)
            .peekable();
        let mut current: Option<Decimal> = None;

        for offset in 0..days {
            let date = start + Duration::days(offset as i64);
            while let Some(obs) = observations.next_if(|o| o.date <= date) {
                current = Some(obs.usd_per_eur);
            }
            rates.push(current);
        }

        let calendar = Self { year, start, rates };
        debug!(
            "Built {} calendar: {} days, first rate on {:?}",
            year,
            calendar.len(),
            calendar.first_covered_date()
        );
        Ok(calendar)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Number of calendar days covered (365 or 366)
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate in force on `date`
    pub fn rate_on(&self, date: NaiveDate) -> Result<Decimal> {
        if date.year() != self.year {
            return Err(TaxError::RateUnavailable { date });
        }
        let offset = (date - self.start).num_days() as usize;
        self.rates
            .get(offset)
            .copied()
            .flatten()
            .ok_or(TaxError::RateUnavailable { date })
    }

    /// Rate on Dec 31, used for year-end position valuation
    pub fn year_end_rate(&self) -> Result<Decimal> {
        let (_, dec31) = year_bounds(self.year)?;
        self.rate_on(dec31)
    }

    pub fn first_covered_date(&self) -> Option<NaiveDate> {
        self.rates
            .iter()
            .position(Option::is_some)
            .map(|offset| self.start + Duration::days(offset as i64))
    }

    /// Every calendar date with its rate, if assigned
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<Decimal>)> + '_ {
        self.rates
            .iter()
            .enumerate()
            .map(move |(offset, rate)| (self.start + Duration::days(offset as i64), *rate))
    }
}
