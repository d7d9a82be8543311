//! Spread positions, closed trades and the statistical bounds that drive them.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a calendar spread position is held.
///
/// `Buy` profits when the spread widens, `Sell` when it narrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadSide {
    Buy,
    Sell,
}

impl fmt::Display for SpreadSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// Outcome of a closed trade. Break-even counts as a loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
}

impl TradeResult {
    #[must_use]
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            Self::Win
        } else {
            Self::Loss
        }
    }
}

/// Position held by the backtester between bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    #[default]
    Flat,
    InSellSpread {
        entry_date: NaiveDate,
        entry_spread: Decimal,
    },
    InBuySpread {
        entry_date: NaiveDate,
        entry_spread: Decimal,
    },
}

impl TradeState {
    /// Opens a position on `side`.
    #[must_use]
    pub const fn open(side: SpreadSide, entry_date: NaiveDate, entry_spread: Decimal) -> Self {
        match side {
            SpreadSide::Buy => Self::InBuySpread {
                entry_date,
                entry_spread,
            },
            SpreadSide::Sell => Self::InSellSpread {
                entry_date,
                entry_spread,
            },
        }
    }

    /// Side of the open position, `None` when flat.
    #[must_use]
    pub const fn side(&self) -> Option<SpreadSide> {
        match self {
            Self::Flat => None,
            Self::InSellSpread { .. } => Some(SpreadSide::Sell),
            Self::InBuySpread { .. } => Some(SpreadSide::Buy),
        }
    }

    #[must_use]
    pub const fn is_flat(&self) -> bool {
        matches!(self, Self::Flat)
    }
}

/// A closed round trip. Created on exit and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub side: SpreadSide,
    pub entry_spread: Decimal,
    pub exit_spread: Decimal,
    pub pnl: Decimal,
    pub holding_days: i64,
    pub result: TradeResult,
}

impl Trade {
    /// Closes a position, computing pnl, holding period and result.
    #[must_use]
    pub fn close(
        side: SpreadSide,
        entry_date: NaiveDate,
        entry_spread: Decimal,
        exit_date: NaiveDate,
        exit_spread: Decimal,
    ) -> Self {
        let pnl = match side {
            SpreadSide::Sell => entry_spread - exit_spread,
            SpreadSide::Buy => exit_spread - entry_spread,
        };

        Self {
            entry_date,
            exit_date,
            side,
            entry_spread,
            exit_spread,
            pnl,
            holding_days: (exit_date - entry_date).num_days(),
            result: TradeResult::from_pnl(pnl),
        }
    }
}

/// Mean-reversion thresholds derived from the spread history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadBounds {
    pub mean: Decimal,
    pub std: Decimal,
    pub upper: Decimal,
    pub lower: Decimal,
    pub stop_loss: Decimal,
}

impl SpreadBounds {
    /// Bounds at one standard deviation around `mean`.
    #[must_use]
    pub fn new(mean: Decimal, std: Decimal, stop_loss_fraction: Decimal) -> Self {
        Self {
            mean,
            std,
            upper: mean + std,
            lower: mean - std,
            stop_loss: std * stop_loss_fraction,
        }
    }

    /// Bounds from the sample mean and sample standard deviation (n - 1) of `spreads`.
    ///
    /// With fewer than two values the deviation is zero and the bounds are degenerate.
    #[must_use]
    pub fn from_spreads(spreads: &[Decimal], stop_loss_fraction: Decimal) -> Self {
        if spreads.is_empty() {
            return Self::new(Decimal::ZERO, Decimal::ZERO, stop_loss_fraction);
        }

        let n = Decimal::from(spreads.len());
        let mean = spreads.iter().copied().sum::<Decimal>() / n;

        let std = if spreads.len() < 2 {
            Decimal::ZERO
        } else {
            let sum_sq: Decimal = spreads.iter().map(|s| (*s - mean) * (*s - mean)).sum();
            (sum_sq / (n - Decimal::ONE)).sqrt().unwrap_or(Decimal::ZERO)
        };

        Self::new(mean, std, stop_loss_fraction)
    }

    /// True when the deviation is zero and no threshold can be crossed meaningfully.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.std <= Decimal::ZERO
    }

    /// Side a position would be opened on for `spread`, using strict inequalities.
    #[must_use]
    pub fn breach(&self, spread: Decimal) -> Option<SpreadSide> {
        if self.is_degenerate() {
            None
        } else if spread > self.upper {
            Some(SpreadSide::Sell)
        } else if spread < self.lower {
            Some(SpreadSide::Buy)
        } else {
            None
        }
    }
}
