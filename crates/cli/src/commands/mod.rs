//! CLI commands for calendar-spread research.

pub mod backtest;
pub mod expiries;
pub mod scan;

pub use backtest::{run_backtest, BacktestArgs};
pub use expiries::{run_expiries, ExpiriesArgs};
pub use scan::{run_scan, ScanArgs};

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Parses an optional `YYYY-MM-DD` argument, defaulting to today's local date.
pub(crate) fn parse_date_or_today(value: Option<&str>) -> Result<NaiveDate> {
    match value {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
