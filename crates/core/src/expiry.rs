//! Monthly expiry calendar for exchange-listed stock futures.
//!
//! Contracts expire on the last Thursday of their month. The schedule here
//! ignores exchange holidays; the data source is the authority on which days
//! actually traded.

use crate::error::CoreError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of expiries needed to cover 200 days of history plus a month of lookahead.
pub const DEFAULT_EXPIRY_COUNT: usize = 9;

/// Exchange wire format for expiry dates, e.g. `25-Jan-2024`.
pub const EXPIRY_FORMAT: &str = "%d-%b-%Y";

/// Maturity date of a monthly contract.
///
/// Parses from `DD-Mon-YYYY` or ISO `YYYY-MM-DD`; displays as `DD-Mon-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expiry(NaiveDate);

impl Expiry {
    /// Wraps a date as an expiry without checking the weekday.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Returns the expiry date.
    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Expiry of the month following this one.
    #[must_use]
    pub fn next(self) -> Self {
        let (year, month) = next_month(self.0.year(), self.0.month());
        last_thursday(year, month)
    }

    /// True when this expiry falls in a calendar month strictly before `today`'s month.
    #[must_use]
    pub fn is_before_month_of(self, today: NaiveDate) -> bool {
        (self.0.year(), self.0.month()) < (today.year(), today.month())
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(EXPIRY_FORMAT))
    }
}

impl FromStr for Expiry {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        NaiveDate::parse_from_str(trimmed, EXPIRY_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
            .map(Self)
            .map_err(|_| CoreError::InvalidExpiry(s.to_string()))
    }
}

impl From<NaiveDate> for Expiry {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

const fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Last Thursday of the given month.
///
/// Scans backward from the month's last calendar day to the first Thursday.
///
/// # Panics
///
/// Panics if `month` is not in `1..=12`.
#[must_use]
pub fn last_thursday(year: i32, month: u32) -> Expiry {
    assert!((1..=12).contains(&month), "month must be in 1..=12, got {month}");

    let mut date = last_day_of_month(year, month);
    while date.weekday() != Weekday::Thu {
        date -= Duration::days(1);
    }
    Expiry(date)
}

/// Expiry of the month containing `date`, or of the next month when `date`
/// is already past it.
#[must_use]
pub fn front_expiry(date: NaiveDate) -> Expiry {
    let expiry = last_thursday(date.year(), date.month());
    if date > expiry.date() {
        expiry.next()
    } else {
        expiry
    }
}

/// `count` consecutive monthly expiries starting at the front expiry for `start`.
///
/// The result is strictly increasing with one expiry per month.
#[must_use]
pub fn expiries_covering(start: NaiveDate, count: usize) -> Vec<Expiry> {
    std::iter::successors(Some(front_expiry(start)), |expiry| Some(expiry.next()))
        .take(count)
        .collect()
}
