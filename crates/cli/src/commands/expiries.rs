//! Prints the monthly expiry schedule.

use super::parse_date_or_today;
use anyhow::Result;
use calspread_core::{expiries_covering, DEFAULT_EXPIRY_COUNT};
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ExpiriesArgs {
    /// First date to cover, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub from: Option<String>,

    /// Number of monthly expiries to list
    #[arg(long, default_value_t = DEFAULT_EXPIRY_COUNT)]
    pub count: usize,
}

/// Runs the expiries command.
///
/// # Errors
/// Returns an error if `--from` is not a valid date.
pub fn run_expiries(args: &ExpiriesArgs) -> Result<()> {
    let from = parse_date_or_today(args.from.as_deref())?;

    for expiry in expiries_covering(from, args.count) {
        println!("{expiry}  ({})", expiry.date().format("%A"));
    }
    Ok(())
}
