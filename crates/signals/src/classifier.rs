//! Labels the current state of an instrument's calendar spread.
//!
//! "Today" is the last bar of the series. A breach is fresh when it started
//! at most one day ago and active when it has persisted longer.

use calspread_core::{ContinuousBar, Signal, SpreadBounds, Trade};

/// Classifies today's spread against `bounds`, using the trade ledger to
/// find when the current breach began.
///
/// Returns [`Signal::Neutral`] for degenerate bounds, an empty series or a
/// missing spread today.
#[must_use]
pub fn classify_signal(series: &[ContinuousBar], trades: &[Trade], bounds: &SpreadBounds) -> Signal {
    if bounds.is_degenerate() {
        return Signal::Neutral;
    }
    let Some(today) = series.last() else {
        return Signal::Neutral;
    };
    let Some(side) = today.spread.and_then(|spread| bounds.breach(spread)) else {
        return Signal::Neutral;
    };

    let Some(last_exit) = trades.iter().map(|trade| trade.exit_date).max() else {
        return Signal::from_breach(side, 0);
    };

    let breach_start = series
        .iter()
        .filter(|bar| bar.date > last_exit)
        .find(|bar| bar.spread.and_then(|spread| bounds.breach(spread)) == Some(side))
        .map_or(today.date, |bar| bar.date);

    Signal::from_breach(side, (today.date - breach_start).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calspread_core::{last_thursday, SpreadSide};
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // ============================================================
    // Test Helpers
    // ============================================================

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + Duration::days(offset)
    }

    fn series(spreads: &[Option<Decimal>]) -> Vec<ContinuousBar> {
        spreads
            .iter()
            .enumerate()
            .map(|(i, spread)| {
                let near = spread.map(|s| dec!(500) + s);
                ContinuousBar::new(
                    day(i as i64),
                    Some(dec!(500)),
                    near,
                    last_thursday(2024, 5),
                    Some(last_thursday(2024, 6)),
                )
            })
            .collect()
    }

    fn bounds() -> SpreadBounds {
        // upper 7, lower 3
        SpreadBounds::new(dec!(5), dec!(2), dec!(0.75))
    }

    fn sell_trade(entry: i64, exit: i64) -> Trade {
        Trade::close(SpreadSide::Sell, day(entry), dec!(8), day(exit), dec!(5))
    }

    // ============================================================
    // Neutral cases
    // ============================================================

    #[test]
    fn empty_series_is_neutral() {
        assert_eq!(classify_signal(&[], &[], &bounds()), Signal::Neutral);
    }

    #[test]
    fn degenerate_bounds_are_neutral() {
        let bars = series(&[Some(dec!(100))]);
        let flat = SpreadBounds::new(dec!(5), Decimal::ZERO, dec!(0.75));
        assert_eq!(classify_signal(&bars, &[], &flat), Signal::Neutral);
    }

    #[test]
    fn missing_spread_today_is_neutral() {
        let bars = series(&[Some(dec!(9)), None]);
        assert_eq!(classify_signal(&bars, &[], &bounds()), Signal::Neutral);
    }

    #[test]
    fn spread_inside_bounds_is_neutral() {
        let bars = series(&[Some(dec!(9)), Some(dec!(7))]);
        assert_eq!(classify_signal(&bars, &[sell_trade(0, 1)], &bounds()), Signal::Neutral);
    }

    // ============================================================
    // No trades
    // ============================================================

    #[test]
    fn no_trades_breach_above_is_fresh_sell() {
        let bars = series(&[Some(dec!(5)), Some(dec!(7.5))]);
        assert_eq!(
            classify_signal(&bars, &[], &bounds()),
            Signal::Fresh {
                side: SpreadSide::Sell,
                days_active: 0
            }
        );
    }

    #[test]
    fn no_trades_breach_below_is_fresh_buy() {
        let bars = series(&[Some(dec!(2))]);
        assert_eq!(
            classify_signal(&bars, &[], &bounds()).side(),
            Some(SpreadSide::Buy)
        );
    }

    // ============================================================
    // With trades
    // ============================================================

    #[test]
    fn breach_on_exit_day_is_fresh() {
        // Stop-loss exit today with the spread still above the upper bound
        let bars = series(&[Some(dec!(7.5)), Some(dec!(9.5))]);
        let trade = Trade::close(SpreadSide::Sell, day(0), dec!(7.5), day(1), dec!(9.5));
        assert_eq!(
            classify_signal(&bars, &[trade], &bounds()),
            Signal::Fresh {
                side: SpreadSide::Sell,
                days_active: 0
            }
        );
    }

    #[test]
    fn breach_since_yesterday_is_fresh() {
        let bars = series(&[Some(dec!(8)), Some(dec!(5)), Some(dec!(2)), Some(dec!(2.5))]);
        let signal = classify_signal(&bars, &[sell_trade(0, 1)], &bounds());
        assert_eq!(
            signal,
            Signal::Fresh {
                side: SpreadSide::Buy,
                days_active: 1
            }
        );
    }

    #[test]
    fn persistent_breach_is_active() {
        let bars = series(&[
            Some(dec!(8)),
            Some(dec!(5)),
            Some(dec!(7.2)),
            Some(dec!(6)),
            Some(dec!(7.9)),
            Some(dec!(8.1)),
        ]);
        let signal = classify_signal(&bars, &[sell_trade(0, 1)], &bounds());
        // First upper breach after the exit is day 2, today is day 5
        assert_eq!(
            signal,
            Signal::Active {
                side: SpreadSide::Sell,
                days_active: 3
            }
        );
    }

    #[test]
    fn opposite_breach_after_exit_is_ignored() {
        let bars = series(&[Some(dec!(8)), Some(dec!(5)), Some(dec!(2)), Some(dec!(5)), Some(dec!(7.5))]);
        let signal = classify_signal(&bars, &[sell_trade(0, 1)], &bounds());
        assert_eq!(
            signal,
            Signal::Fresh {
                side: SpreadSide::Sell,
                days_active: 0
            }
        );
    }

    #[test]
    fn latest_exit_is_used_regardless_of_ledger_order() {
        let bars = series(&[Some(dec!(8)), Some(dec!(5)), Some(dec!(8)), Some(dec!(5)), Some(dec!(7.5)), Some(dec!(7.6)), Some(dec!(7.7))]);
        let trades = vec![sell_trade(2, 3), sell_trade(0, 1)];
        assert_eq!(
            classify_signal(&bars, &trades, &bounds()),
            Signal::Active {
                side: SpreadSide::Sell,
                days_active: 2
            }
        );
    }
}
