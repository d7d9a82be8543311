use clap::{Parser, Subcommand};

mod commands;
mod report;

use commands::{BacktestArgs, ExpiriesArgs, ScanArgs};

#[derive(Parser)]
#[command(name = "calspread")]
#[command(about = "Calendar-spread research on NSE stock futures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List upcoming monthly expiries
    Expiries(ExpiriesArgs),
    /// Backtest the calendar spread of one underlying
    Backtest(BacktestArgs),
    /// Scan all underlyings and rank current signals
    Scan(ScanArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Expiries(args) => commands::run_expiries(&args)?,
        Commands::Backtest(args) => commands::run_backtest(args).await?,
        Commands::Scan(args) => commands::run_scan(args).await?,
    }

    Ok(())
}
