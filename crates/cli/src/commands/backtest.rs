//! Backtests the calendar spread of a single underlying.

use super::parse_date_or_today;
use crate::report::ReportFormatter;
use anyhow::{Context, Result};
use calspread_backtest::HistoricalContractSource;
use calspread_core::{ConfigLoader, Underlying};
use calspread_data::{NseDataSource, SessionManager};
use calspread_scanner::{analyze_instrument, InstrumentReport, ScanSettings};
use clap::Args;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Underlying symbol (e.g., "SBIN")
    #[arg(short, long)]
    pub symbol: String,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Contract history CSV to use instead of fetching from NSE
    #[arg(short, long)]
    pub data: Option<String>,

    /// Last day of the backtest window, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub as_of: Option<String>,

    /// Print every trade
    #[arg(long)]
    pub trades: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the backtest command.
///
/// # Errors
/// Returns an error if configuration, the CSV file or the NSE client cannot be set up.
pub async fn run_backtest(args: BacktestArgs) -> Result<()> {
    let config = ConfigLoader::load_from(&args.config)
        .with_context(|| format!("loading config from {}", args.config))?;
    let today = parse_date_or_today(args.as_of.as_deref())?;
    let settings = ScanSettings::from_config(&config, today)?;
    let symbol = args.symbol.to_uppercase();
    let underlying = Underlying::new(symbol.clone(), symbol.clone());

    info!(symbol = %symbol, as_of = %today, "Running calendar-spread backtest");

    let report = match &args.data {
        Some(path) => {
            let source = HistoricalContractSource::from_csv(path)?;
            analyze_instrument(&source, underlying, &settings).await
        }
        None => {
            let session = Arc::new(SessionManager::new(&config.nse)?);
            let source = NseDataSource::from_config(&config.nse, Arc::clone(&session))?;
            let report = analyze_instrument(&source, underlying, &settings).await;
            session.release().await;
            report
        }
    };

    let Some(report) = report else {
        println!("No contract data found for {symbol}");
        return Ok(());
    };

    print_report(&report, args.trades, args.json)
}

fn print_report(report: &InstrumentReport, with_trades: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", ReportFormatter::backtest(report, with_trades));
    }
    Ok(())
}
