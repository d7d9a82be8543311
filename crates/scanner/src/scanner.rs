//! Runs the fetch, build, backtest and classify pipeline for many instruments.
//!
//! Instruments run concurrently on a fixed number of workers. Each one is
//! bounded by its own timeout and reports into its own slot, so a slow or
//! failing instrument never affects the others.

use crate::report::InstrumentReport;
use anyhow::Result;
use calspread_backtest::{run_backtest, BacktestParams, ContinuousSeriesBuilder, TradeStatistics};
use calspread_core::{AppConfig, ContractDataSource, SeriesWindow, Underlying};
use calspread_signals::classify_signal;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub today: NaiveDate,
    pub history_days: u32,
    pub lookahead_days: u32,
    pub expiry_count: usize,
    pub params: BacktestParams,
    pub workers: usize,
    pub instrument_timeout: Duration,
}

impl ScanSettings {
    /// Settings for a scan ending on `today`.
    ///
    /// # Errors
    /// Returns an error if the backtest parameters are invalid.
    pub fn from_config(config: &AppConfig, today: NaiveDate) -> Result<Self> {
        Ok(Self {
            today,
            history_days: config.backtest.history_days,
            lookahead_days: config.backtest.lookahead_days,
            expiry_count: config.backtest.expiry_count,
            params: BacktestParams::from_config(&config.backtest)?,
            workers: config.scanner.workers,
            instrument_timeout: Duration::from_secs(config.scanner.instrument_timeout_secs),
        })
    }

    #[must_use]
    pub fn window(&self) -> SeriesWindow {
        SeriesWindow::trailing(self.today, self.history_days).with_lookahead(self.lookahead_days)
    }
}

/// Builds, backtests and classifies one instrument.
///
/// Contracts are fetched through the lookahead, but only bars up to
/// `settings.today` reach the backtest and the classifier.
///
/// Returns `None` when no contract data was found.
pub async fn analyze_instrument(
    source: &dyn ContractDataSource,
    underlying: Underlying,
    settings: &ScanSettings,
) -> Option<InstrumentReport> {
    let window = settings.window();
    let mut series = ContinuousSeriesBuilder::new(source)
        .with_expiry_count(settings.expiry_count)
        .build(&underlying.symbol, &window)
        .await;

    let built = series.len();
    series.retain(|bar| bar.date <= window.end());
    if series.len() < built {
        debug!(
            symbol = %underlying.symbol,
            as_of = %window.end(),
            dropped = built - series.len(),
            "Dropped bars after the as-of date"
        );
    }

    if series.is_empty() {
        return None;
    }

    let result = run_backtest(&series, settings.params);
    let statistics = TradeStatistics::from_trades(&result.trades);
    let signal = classify_signal(&series, &result.trades, &result.bounds);

    Some(InstrumentReport {
        underlying,
        result,
        statistics,
        signal,
    })
}

pub struct Scanner {
    source: Arc<dyn ContractDataSource>,
    settings: ScanSettings,
}

impl Scanner {
    #[must_use]
    pub fn new(source: Arc<dyn ContractDataSource>, settings: ScanSettings) -> Self {
        Self { source, settings }
    }

    /// Scans `instruments`, returning reports in input order.
    ///
    /// Instruments with no data, that time out or that panic are logged and
    /// left out. Once `cancel` turns true no further instruments are started;
    /// those already running finish normally.
    pub async fn run(
        &self,
        instruments: Vec<Underlying>,
        mut cancel: watch::Receiver<bool>,
    ) -> Vec<InstrumentReport> {
        let total = instruments.len();
        let workers = self.settings.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        info!(instruments = total, workers, "Starting scan");

        for (slot, underlying) in instruments.into_iter().enumerate() {
            if *cancel.borrow() {
                warn!(scheduled = slot, total, "Scan cancelled, not starting remaining instruments");
                break;
            }

            let permit = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => {
                    warn!(scheduled = slot, total, "Scan cancelled, not starting remaining instruments");
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let source = Arc::clone(&self.source);
            let settings = self.settings.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let symbol = underlying.symbol.clone();
                let outcome = tokio::time::timeout(
                    settings.instrument_timeout,
                    analyze_instrument(source.as_ref(), underlying, &settings),
                )
                .await;
                (slot, symbol, outcome)
            });
        }

        let mut slots: Vec<Option<InstrumentReport>> = Vec::new();
        slots.resize_with(total, || None);
        let mut completed = 0usize;

        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((slot, symbol, Ok(Some(report)))) => {
                    info!(
                        symbol = %symbol,
                        completed,
                        total,
                        trades = report.statistics.total_trades,
                        signal = ?report.signal,
                        "Instrument scanned"
                    );
                    slots[slot] = Some(report);
                }
                Ok((_, symbol, Ok(None))) => {
                    info!(symbol = %symbol, completed, total, "No contract data, skipping");
                }
                Ok((_, symbol, Err(_))) => {
                    warn!(
                        symbol = %symbol,
                        timeout_secs = self.settings.instrument_timeout.as_secs_f64(),
                        "Instrument timed out, skipping"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Instrument task failed, skipping");
                }
            }
        }

        let reports: Vec<InstrumentReport> = slots.into_iter().flatten().collect();
        info!(reports = reports.len(), total, "Scan complete");
        reports
    }
}

/// Resolves once cancellation is requested; never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
