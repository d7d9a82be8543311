#![allow(clippy::format_push_string)]

use calspread_backtest::{BacktestResult, TradeStatistics};
use calspread_core::{Signal, SpreadSide};
use calspread_scanner::InstrumentReport;
use rust_decimal::Decimal;

const HEAVY_RULE: &str = "═══════════════════════════════════════════════════════════════\n";
const LIGHT_RULE: &str = "───────────────────────────────────────────────────────────────\n";

pub struct ReportFormatter;

impl ReportFormatter {
    /// Short label such as `SELL (Fresh)`, `BUY (Active 3d)` or `NEUTRAL`.
    #[must_use]
    pub fn signal(signal: &Signal) -> String {
        match signal {
            Signal::Neutral => "NEUTRAL".to_string(),
            Signal::Fresh { side, .. } => format!("{} (Fresh)", side_label(*side)),
            Signal::Active { side, days_active } => {
                format!("{} (Active {days_active}d)", side_label(*side))
            }
        }
    }

    /// Full single-instrument report.
    #[must_use]
    pub fn backtest(report: &InstrumentReport, with_trades: bool) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(HEAVY_RULE);
        output.push_str(&format!(
            "  CALENDAR SPREAD: {} ({})\n",
            report.underlying.symbol, report.underlying.name
        ));
        output.push_str(HEAVY_RULE);
        output.push('\n');

        output.push_str(&Self::bounds(&report.result));
        output.push('\n');
        output.push_str(&Self::statistics(&report.statistics));
        output.push('\n');

        if with_trades && !report.result.trades.is_empty() {
            output.push_str(&Self::trades(&report.result));
            output.push('\n');
        }

        output.push_str(&format!("Current Signal:        {}\n", Self::signal(&report.signal)));
        output.push_str(HEAVY_RULE);
        output
    }

    fn bounds(result: &BacktestResult) -> String {
        let mut output = String::new();
        let bounds = &result.bounds;

        output.push_str("Spread Statistics\n");
        output.push_str(LIGHT_RULE);
        if let (Some(first), Some(last)) = (result.series.first(), result.series.last()) {
            output.push_str(&format!("Period:                {} to {}\n", first.bar.date, last.bar.date));
        }
        output.push_str(&format!("Bars:                  {}\n", result.series.len()));
        output.push_str(&format!("Mean Spread:           {:.2}\n", bounds.mean));
        output.push_str(&format!("Std Deviation:         {:.2}\n", bounds.std));
        output.push_str(&format!("Upper Bound:           {:.2}\n", bounds.upper));
        output.push_str(&format!("Lower Bound:           {:.2}\n", bounds.lower));
        output.push_str(&format!("Stop Loss:             {:.2}\n", bounds.stop_loss));
        if let Some(spread) = result.series.last().and_then(|bar| bar.bar.spread) {
            output.push_str(&format!("Latest Spread:         {spread:.2}\n"));
        }
        output
    }

    fn statistics(stats: &TradeStatistics) -> String {
        let mut output = String::new();

        output.push_str("Trade Statistics\n");
        output.push_str(LIGHT_RULE);
        output.push_str(&format!("Total Trades:          {}\n", stats.total_trades));
        output.push_str(&format!(
            "Wins / Losses:         {} / {}\n",
            stats.wins, stats.losses
        ));
        output.push_str(&format!("Win Rate:              {:.2}%\n", stats.win_rate));
        output.push_str(&format!("Total PnL:             {:.2}\n", stats.total_pnl));
        output.push_str(&format!("Average PnL:           {:.2}\n", stats.average_pnl));
        output.push_str(&format!("Max Profit:            {:.2}\n", stats.max_profit));
        output.push_str(&format!("Max Loss:              {:.2}\n", stats.max_loss));
        output.push_str(&format!(
            "Avg Holding Days:      {:.1}\n",
            stats.average_holding_days
        ));
        output.push_str(&format!(
            "Profit Factor:         {}\n",
            format_profit_factor(stats.profit_factor)
        ));
        output
    }

    fn trades(result: &BacktestResult) -> String {
        let mut output = String::new();

        output.push_str("Trades\n");
        output.push_str(LIGHT_RULE);
        output.push_str("Side  Entry       Exit        Entry Sprd  Exit Sprd      PnL  Days\n");
        for trade in &result.trades {
            output.push_str(&format!(
                "{:<4}  {}  {}  {:>10.2}  {:>9.2}  {:>7.2}  {:>4}\n",
                side_label(trade.side),
                trade.entry_date,
                trade.exit_date,
                trade.entry_spread,
                trade.exit_spread,
                trade.pnl,
                trade.holding_days
            ));
        }
        output
    }

    /// Ranked one-line-per-instrument summary of a scan.
    #[must_use]
    pub fn scan(reports: &[InstrumentReport]) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(HEAVY_RULE);
        output.push_str("                  CALENDAR SPREAD SCAN\n");
        output.push_str(HEAVY_RULE);

        if reports.is_empty() {
            output.push_str("No instruments with contract data.\n");
            return output;
        }

        output.push_str("Symbol        Signal             Trades  Win Rate   Total PnL\n");
        output.push_str(LIGHT_RULE);
        for report in reports {
            output.push_str(&format!(
                "{:<12}  {:<17}  {:>6}  {:>7.2}%  {:>10.2}\n",
                report.underlying.symbol,
                Self::signal(&report.signal),
                report.statistics.total_trades,
                report.statistics.win_rate,
                report.statistics.total_pnl
            ));
        }
        output.push_str(HEAVY_RULE);
        output
    }
}

const fn side_label(side: SpreadSide) -> &'static str {
    match side {
        SpreadSide::Buy => "BUY",
        SpreadSide::Sell => "SELL",
    }
}

fn format_profit_factor(profit_factor: Option<Decimal>) -> String {
    profit_factor.map_or_else(|| "inf".to_string(), |pf| format!("{pf:.2}"))
}
