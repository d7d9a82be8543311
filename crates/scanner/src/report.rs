use calspread_backtest::{BacktestResult, TradeStatistics};
use calspread_core::{Signal, Underlying};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Outcome of one instrument's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub underlying: Underlying,
    pub result: BacktestResult,
    pub statistics: TradeStatistics,
    pub signal: Signal,
}

/// Sorts reports for display: fresh sells, fresh buys, active sells, active
/// buys, then neutral. Within a group more trades come first, then the
/// higher win rate.
pub fn rank_reports(reports: &mut [InstrumentReport]) {
    reports.sort_by(compare_reports);
}

fn compare_reports(a: &InstrumentReport, b: &InstrumentReport) -> Ordering {
    a.signal
        .priority()
        .cmp(&b.signal.priority())
        .then_with(|| b.statistics.total_trades.cmp(&a.statistics.total_trades))
        .then_with(|| b.statistics.win_rate.cmp(&a.statistics.win_rate))
}
