//! Scans every listed underlying and ranks the current signals.

use super::parse_date_or_today;
use crate::report::ReportFormatter;
use anyhow::{Context, Result};
use calspread_backtest::HistoricalContractSource;
use calspread_core::{ConfigLoader, ContractDataSource, Underlying, UnderlyingSource};
use calspread_data::{NseDataSource, SessionManager};
use calspread_scanner::{rank_reports, ScanSettings, Scanner};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Concurrent instruments (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Scan at most this many underlyings (overrides config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Contract history CSV to use instead of fetching from NSE
    #[arg(short, long)]
    pub data: Option<String>,

    /// Last day of the backtest window, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub as_of: Option<String>,

    /// Print the reports as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the scan command. Ctrl-C stops scheduling new instruments.
///
/// # Errors
/// Returns an error if configuration or the data source cannot be set up,
/// or the underlying list cannot be fetched.
pub async fn run_scan(args: ScanArgs) -> Result<()> {
    let mut config = ConfigLoader::load_from(&args.config)
        .with_context(|| format!("loading config from {}", args.config))?;
    if let Some(workers) = args.workers {
        config.scanner.workers = workers;
    }
    if args.limit.is_some() {
        config.scanner.limit = args.limit;
    }

    let today = parse_date_or_today(args.as_of.as_deref())?;
    let settings = ScanSettings::from_config(&config, today)?;

    let (session, source, universe): (Option<Arc<SessionManager>>, Arc<dyn ContractDataSource>, Vec<Underlying>) =
        match &args.data {
            Some(path) => {
                let source = Arc::new(HistoricalContractSource::from_csv(path)?);
                let universe = source.underlyings().await?;
                let source: Arc<dyn ContractDataSource> = source;
                (None, source, universe)
            }
            None => {
                let session = Arc::new(SessionManager::new(&config.nse)?);
                let source = Arc::new(NseDataSource::from_config(&config.nse, Arc::clone(&session))?);
                let universe = source
                    .underlyings()
                    .await
                    .context("fetching underlying list")?;
                let source: Arc<dyn ContractDataSource> = source;
                (Some(session), source, universe)
            }
        };

    let universe: Vec<Underlying> = match config.scanner.limit {
        Some(limit) => universe.into_iter().take(limit).collect(),
        None => universe,
    };
    info!(underlyings = universe.len(), as_of = %today, "Scanning underlyings");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, finishing running instruments");
            let _ = cancel_tx.send(true);
        }
    });

    let scanner = Scanner::new(source, settings);
    let mut reports = scanner.run(universe, cancel_rx).await;
    ctrl_c.abort();

    if let Some(session) = session {
        session.release().await;
    }

    rank_reports(&mut reports);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", ReportFormatter::scan(&reports));
    }
    Ok(())
}
