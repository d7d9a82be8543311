use crate::error::CoreError;
use crate::expiry::Expiry;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Days fetched past the window end so the near leg is populated up to today.
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 31;

/// Trailing history used to build a continuous series.
pub const DEFAULT_HISTORY_DAYS: u32 = 200;

/// One trading day of a single futures contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub open_interest: Decimal,
    pub settlement_price: Decimal,
}

impl ContractBar {
    /// Bar whose prices all equal `close`, with zero volume and open interest.
    #[must_use]
    pub const fn from_close(date: NaiveDate, close: Decimal) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
            open_interest: Decimal::ZERO,
            settlement_price: close,
        }
    }
}

/// One day of the stitched current-month / near-month series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousBar {
    pub date: NaiveDate,
    pub current_close: Option<Decimal>,
    pub near_close: Option<Decimal>,
    /// `near_close - current_close`, absent when either leg is missing.
    pub spread: Option<Decimal>,
    pub current_expiry: Expiry,
    /// Absent when no later expiry was scheduled.
    pub near_expiry: Option<Expiry>,
}

impl ContinuousBar {
    /// Builds a bar, deriving the spread from the two legs.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        current_close: Option<Decimal>,
        near_close: Option<Decimal>,
        current_expiry: Expiry,
        near_expiry: Option<Expiry>,
    ) -> Self {
        let spread = match (current_close, near_close) {
            (Some(current), Some(near)) => Some(near - current),
            _ => None,
        };

        Self {
            date,
            current_close,
            near_close,
            spread,
            current_expiry,
            near_expiry,
        }
    }
}

/// Date range a continuous series is built over.
///
/// Contract data is fetched up to `end + lookahead_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesWindow {
    start: NaiveDate,
    end: NaiveDate,
    lookahead_days: u32,
}

impl SeriesWindow {
    /// Creates a window with the default lookahead.
    ///
    /// # Errors
    /// Returns `CoreError::InvertedWindow` if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvertedWindow { start, end });
        }
        Ok(Self {
            start,
            end,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        })
    }

    /// Window covering the `history_days` days up to and including `today`.
    #[must_use]
    pub fn trailing(today: NaiveDate, history_days: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(history_days)),
            end: today,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }

    /// Sets the lookahead past the window end.
    #[must_use]
    pub const fn with_lookahead(mut self, days: u32) -> Self {
        self.lookahead_days = days;
        self
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Last date requested from the data source.
    #[must_use]
    pub fn fetch_end(&self) -> NaiveDate {
        self.end + Duration::days(i64::from(self.lookahead_days))
    }

    /// True if `date` lies in `[start, fetch_end]`.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.fetch_end()
    }
}

/// An instrument with listed futures, as supplied by the underlying list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Underlying {
    pub symbol: String,
    pub name: String,
}

impl Underlying {
    #[must_use]
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::last_thursday;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn continuous_bar_spread_is_near_minus_current() {
        let bar = ContinuousBar::new(
            date(2024, 1, 10),
            Some(dec!(100.5)),
            Some(dec!(103.25)),
            last_thursday(2024, 1),
            Some(last_thursday(2024, 2)),
        );
        assert_eq!(bar.spread, Some(dec!(2.75)));
    }

    #[test]
    fn continuous_bar_spread_absent_with_missing_leg() {
        let expiry = last_thursday(2024, 1);
        let no_near = ContinuousBar::new(date(2024, 1, 10), Some(dec!(100)), None, expiry, None);
        let no_current = ContinuousBar::new(date(2024, 1, 10), None, Some(dec!(100)), expiry, None);
        assert_eq!(no_near.spread, None);
        assert_eq!(no_current.spread, None);
    }

    #[test]
    fn window_rejects_inverted_range() {
        let err = SeriesWindow::new(date(2024, 2, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, CoreError::InvertedWindow { .. }));
    }

    #[test]
    fn window_single_day_is_valid() {
        let window = SeriesWindow::new(date(2024, 1, 1), date(2024, 1, 1)).unwrap();
        assert_eq!(window.fetch_end(), date(2024, 2, 1));
    }

    #[test]
    fn trailing_window_bounds() {
        let window = SeriesWindow::trailing(date(2024, 7, 20), DEFAULT_HISTORY_DAYS);
        assert_eq!(window.start(), date(2024, 1, 2));
        assert_eq!(window.end(), date(2024, 7, 20));
        assert_eq!(window.fetch_end(), date(2024, 8, 20));
    }

    #[test]
    fn window_contains_lookahead() {
        let window = SeriesWindow::new(date(2024, 1, 1), date(2024, 1, 31))
            .unwrap()
            .with_lookahead(5);
        assert!(window.contains(date(2024, 2, 5)));
        assert!(!window.contains(date(2024, 2, 6)));
        assert!(!window.contains(date(2023, 12, 31)));
    }

    #[test]
    fn contract_bar_serializes_decimals_as_strings() {
        let bar = ContractBar::from_close(date(2024, 1, 2), dec!(1234.5));
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["close"], "1234.5");
        assert_eq!(json["date"], "2024-01-02");
    }
}
