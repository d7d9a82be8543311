use calspread_core::{Trade, TradeResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate performance of a trade ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
    pub average_holding_days: Decimal,
    pub max_profit: Decimal,
    pub max_loss: Decimal,
    /// Percentage of winning trades, 0 to 100.
    pub win_rate: Decimal,
    /// Gross profit over gross loss; `None` when there are no losing trades.
    pub profit_factor: Option<Decimal>,
}

impl TradeStatistics {
    #[must_use]
    pub fn from_trades(trades: &[Trade]) -> Self {
        let total_trades = trades.len();
        if total_trades == 0 {
            return Self::default();
        }

        let count = Decimal::from(total_trades);
        let wins = trades.iter().filter(|t| t.result == TradeResult::Win).count();
        let losses = total_trades - wins;

        let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        let holding_days: i64 = trades.iter().map(|t| t.holding_days).sum();

        let max_profit = trades.iter().map(|t| t.pnl).max().unwrap_or_default();
        let max_loss = trades.iter().map(|t| t.pnl).min().unwrap_or_default();

        let gross_profit: Decimal = trades.iter().map(|t| t.pnl).filter(|p| *p > Decimal::ZERO).sum();
        let gross_loss: Decimal = trades.iter().map(|t| t.pnl).filter(|p| *p < Decimal::ZERO).sum();
        let profit_factor = if gross_loss.is_zero() {
            None
        } else {
            Some((gross_profit / gross_loss).abs())
        };

        Self {
            total_trades,
            wins,
            losses,
            total_pnl,
            average_pnl: total_pnl / count,
            average_holding_days: Decimal::from(holding_days) / count,
            max_profit,
            max_loss,
            win_rate: Decimal::from(wins) * Decimal::ONE_HUNDRED / count,
            profit_factor,
        }
    }
}

impl Default for TradeStatistics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            total_pnl: Decimal::ZERO,
            average_pnl: Decimal::ZERO,
            average_holding_days: Decimal::ZERO,
            max_profit: Decimal::ZERO,
            max_loss: Decimal::ZERO,
            win_rate: Decimal::ZERO,
            profit_factor: None,
        }
    }
}
