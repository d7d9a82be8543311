//! Mean-reversion backtest over a continuous spread series.
//!
//! Bounds come from the whole series while trades are only simulated over
//! the most recent `testing_window` bars.

use calspread_core::{
    ContinuousBar, CoreError, SpreadBounds, SpreadSide, Trade, TradeState,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bars simulated at the end of the series.
pub const DEFAULT_TESTING_WINDOW: usize = 150;

/// Stop loss as a fraction of the spread's standard deviation.
pub const DEFAULT_STOP_LOSS_FRACTION: Decimal = dec!(0.75);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestParams {
    stop_loss_fraction: Decimal,
    testing_window: usize,
}

impl BacktestParams {
    /// # Errors
    /// Returns `CoreError::InvalidParameter` if `stop_loss_fraction` is negative.
    pub fn new(stop_loss_fraction: Decimal, testing_window: usize) -> Result<Self, CoreError> {
        if stop_loss_fraction < Decimal::ZERO {
            return Err(CoreError::invalid_parameter(
                "stop_loss_fraction",
                format!("must be non-negative, got {stop_loss_fraction}"),
            ));
        }
        Ok(Self {
            stop_loss_fraction,
            testing_window,
        })
    }

    /// Builds parameters from the `[backtest]` configuration section.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidParameter` if the fraction is negative or not finite.
    pub fn from_config(config: &calspread_core::BacktestConfig) -> Result<Self, CoreError> {
        let fraction = Decimal::try_from(config.stop_loss_fraction).map_err(|e| {
            CoreError::invalid_parameter("stop_loss_fraction", e.to_string())
        })?;
        Self::new(fraction, config.testing_window)
    }

    #[must_use]
    pub const fn stop_loss_fraction(&self) -> Decimal {
        self.stop_loss_fraction
    }

    #[must_use]
    pub const fn testing_window(&self) -> usize {
        self.testing_window
    }
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            stop_loss_fraction: DEFAULT_STOP_LOSS_FRACTION,
            testing_window: DEFAULT_TESTING_WINDOW,
        }
    }
}

/// What happened on a bar during the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BarAnnotation {
    None,
    Entry {
        side: SpreadSide,
        spread: Decimal,
    },
    Exit {
        side: SpreadSide,
        spread: Decimal,
        pnl: Decimal,
    },
}

/// A continuous bar with the position held at its close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedBar {
    pub bar: ContinuousBar,
    pub annotation: BarAnnotation,
    pub state: TradeState,
    /// False for bars before the testing window.
    pub tested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub series: Vec<AnnotatedBar>,
    pub trades: Vec<Trade>,
    pub bounds: SpreadBounds,
}

impl BacktestResult {
    /// The continuous bars without annotations.
    #[must_use]
    pub fn bars(&self) -> Vec<ContinuousBar> {
        self.series.iter().map(|annotated| annotated.bar.clone()).collect()
    }
}

pub struct SpreadBacktester {
    params: BacktestParams,
}

impl SpreadBacktester {
    #[must_use]
    pub const fn new(params: BacktestParams) -> Self {
        Self { params }
    }

    /// Computes bounds over every defined spread, then simulates the testing window.
    #[must_use]
    pub fn run(&self, series: &[ContinuousBar]) -> BacktestResult {
        let spreads: Vec<Decimal> = series.iter().filter_map(|bar| bar.spread).collect();
        let bounds = SpreadBounds::from_spreads(&spreads, self.params.stop_loss_fraction);

        debug!(
            bars = series.len(),
            spreads = spreads.len(),
            mean = %bounds.mean,
            std = %bounds.std,
            "Spread bounds computed"
        );

        self.simulate(series, bounds)
    }

    /// Walks the testing window with fixed `bounds`.
    ///
    /// Entries are disabled when the bounds are degenerate or the series has
    /// fewer than two bars.
    #[must_use]
    pub fn simulate(&self, series: &[ContinuousBar], bounds: SpreadBounds) -> BacktestResult {
        let first_tested = series.len().saturating_sub(self.params.testing_window);
        let entries_enabled = series.len() >= 2 && !bounds.is_degenerate();

        let mut state = TradeState::Flat;
        let mut trades = Vec::new();
        let mut annotated = Vec::with_capacity(series.len());

        for (idx, bar) in series.iter().enumerate() {
            let tested = idx >= first_tested;
            let mut annotation = BarAnnotation::None;

            if let (true, Some(spread)) = (tested, bar.spread) {
                match state {
                    TradeState::Flat => {
                        if let Some(side) = bounds.breach(spread).filter(|_| entries_enabled) {
                            state = TradeState::open(side, bar.date, spread);
                            annotation = BarAnnotation::Entry { side, spread };
                        }
                    }
                    TradeState::InSellSpread {
                        entry_date,
                        entry_spread,
                    } => {
                        if should_exit(SpreadSide::Sell, entry_spread, spread, &bounds) {
                            let trade = close(SpreadSide::Sell, entry_date, entry_spread, bar.date, spread);
                            annotation = BarAnnotation::Exit {
                                side: trade.side,
                                spread,
                                pnl: trade.pnl,
                            };
                            trades.push(trade);
                            state = TradeState::Flat;
                        }
                    }
                    TradeState::InBuySpread {
                        entry_date,
                        entry_spread,
                    } => {
                        if should_exit(SpreadSide::Buy, entry_spread, spread, &bounds) {
                            let trade = close(SpreadSide::Buy, entry_date, entry_spread, bar.date, spread);
                            annotation = BarAnnotation::Exit {
                                side: trade.side,
                                spread,
                                pnl: trade.pnl,
                            };
                            trades.push(trade);
                            state = TradeState::Flat;
                        }
                    }
                }
            }

            annotated.push(AnnotatedBar {
                bar: bar.clone(),
                annotation,
                state,
                tested,
            });
        }

        info!(
            bars = series.len(),
            tested = series.len() - first_tested,
            trades = trades.len(),
            "Backtest complete"
        );

        BacktestResult {
            series: annotated,
            trades,
            bounds,
        }
    }
}

/// Runs the spread backtest over `series` with `params`.
#[must_use]
pub fn run_backtest(series: &[ContinuousBar], params: BacktestParams) -> BacktestResult {
    SpreadBacktester::new(params).run(series)
}

/// Exit on reversion to the mean or when the loss exceeds the stop.
fn should_exit(side: SpreadSide, entry: Decimal, current: Decimal, bounds: &SpreadBounds) -> bool {
    let (unrealized, reverted) = match side {
        SpreadSide::Sell => (entry - current, current <= bounds.mean),
        SpreadSide::Buy => (current - entry, current >= bounds.mean),
    };
    reverted || unrealized < -bounds.stop_loss
}

fn close(
    side: SpreadSide,
    entry_date: NaiveDate,
    entry_spread: Decimal,
    exit_date: NaiveDate,
    exit_spread: Decimal,
) -> Trade {
    let trade = Trade::close(side, entry_date, entry_spread, exit_date, exit_spread);
    debug!(
        side = %trade.side,
        entry = %trade.entry_date,
        exit = %trade.exit_date,
        pnl = %trade.pnl,
        "Trade closed"
    );
    trade
}
