//! Current-state label for an instrument's calendar spread.

use crate::trade::SpreadSide;
use serde::{Deserialize, Serialize};

/// Breaches at most this many days old are reported as fresh.
pub const FRESH_SIGNAL_MAX_DAYS: i64 = 1;

/// Where today's spread sits relative to its bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    /// Spread inside its bounds.
    #[default]
    Neutral,
    /// Bound breached within the last day.
    Fresh { side: SpreadSide, days_active: i64 },
    /// Bound breached and still breached for longer than a day.
    Active { side: SpreadSide, days_active: i64 },
}

impl Signal {
    /// Labels a breach on `side` that started `days_active` days ago.
    #[must_use]
    pub const fn from_breach(side: SpreadSide, days_active: i64) -> Self {
        if days_active <= FRESH_SIGNAL_MAX_DAYS {
            Self::Fresh { side, days_active }
        } else {
            Self::Active { side, days_active }
        }
    }

    /// Side of the breach, `None` when neutral.
    #[must_use]
    pub const fn side(&self) -> Option<SpreadSide> {
        match self {
            Self::Neutral => None,
            Self::Fresh { side, .. } | Self::Active { side, .. } => Some(*side),
        }
    }

    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }

    /// Display order: fresh sells, fresh buys, active sells, active buys, neutral.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Fresh {
                side: SpreadSide::Sell,
                ..
            } => 0,
            Self::Fresh {
                side: SpreadSide::Buy,
                ..
            } => 1,
            Self::Active {
                side: SpreadSide::Sell,
                ..
            } => 2,
            Self::Active {
                side: SpreadSide::Buy,
                ..
            } => 3,
            Self::Neutral => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breach_age_decides_fresh_or_active() {
        assert_eq!(
            Signal::from_breach(SpreadSide::Buy, 0),
            Signal::Fresh {
                side: SpreadSide::Buy,
                days_active: 0
            }
        );
        assert!(Signal::from_breach(SpreadSide::Sell, 1).is_fresh());
        assert_eq!(
            Signal::from_breach(SpreadSide::Sell, 3),
            Signal::Active {
                side: SpreadSide::Sell,
                days_active: 3
            }
        );
    }

    #[test]
    fn priority_orders_fresh_sell_first_and_neutral_last() {
        let mut signals = vec![
            Signal::Neutral,
            Signal::from_breach(SpreadSide::Buy, 5),
            Signal::from_breach(SpreadSide::Buy, 0),
            Signal::from_breach(SpreadSide::Sell, 5),
            Signal::from_breach(SpreadSide::Sell, 1),
        ];
        signals.sort_by_key(Signal::priority);

        assert_eq!(signals[0].side(), Some(SpreadSide::Sell));
        assert!(signals[0].is_fresh());
        assert_eq!(signals[1].side(), Some(SpreadSide::Buy));
        assert!(signals[1].is_fresh());
        assert!(matches!(signals[2], Signal::Active { side: SpreadSide::Sell, .. }));
        assert!(matches!(signals[3], Signal::Active { side: SpreadSide::Buy, .. }));
        assert_eq!(signals[4], Signal::Neutral);
    }

    #[test]
    fn signal_serializes_as_tagged_value() {
        let json = serde_json::to_value(Signal::from_breach(SpreadSide::Sell, 4)).unwrap();
        assert_eq!(json["kind"], "active");
        assert_eq!(json["side"], "Sell");
        assert_eq!(json["days_active"], 4);
    }

    #[test]
    fn default_signal_is_neutral() {
        assert_eq!(Signal::default(), Signal::Neutral);
    }
}
