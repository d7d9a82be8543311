//! Stitches monthly futures contracts into one current-month / near-month series.
//!
//! For each trading day the current leg is the earliest expiry on or after
//! the day and the near leg is the expiry after that. Missing closes are
//! carried forward only while the leg keeps the same contract, so a roll
//! never inherits a price from the contract it replaced.

use calspread_core::{
    expiries_covering, ContinuousBar, ContractBar, ContractDataSource, Expiry, SeriesWindow,
    DEFAULT_EXPIRY_COUNT,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Builds continuous series by fetching every scheduled contract from a data source.
pub struct ContinuousSeriesBuilder<'a> {
    source: &'a dyn ContractDataSource,
    expiry_count: usize,
}

impl<'a> ContinuousSeriesBuilder<'a> {
    #[must_use]
    pub fn new(source: &'a dyn ContractDataSource) -> Self {
        Self {
            source,
            expiry_count: DEFAULT_EXPIRY_COUNT,
        }
    }

    /// Sets how many monthly expiries are fetched from the window start.
    #[must_use]
    pub const fn with_expiry_count(mut self, expiry_count: usize) -> Self {
        self.expiry_count = expiry_count;
        self
    }

    /// Fetches each contract over the window and assembles the series.
    ///
    /// Contracts with no data leave their leg empty; this never fails.
    pub async fn build(&self, symbol: &str, window: &SeriesWindow) -> Vec<ContinuousBar> {
        let expiries = expiries_covering(window.start(), self.expiry_count);

        info!(
            symbol,
            start = %window.start(),
            end = %window.fetch_end(),
            expiries = expiries.len(),
            "Building continuous series"
        );

        let mut contracts = BTreeMap::new();
        for expiry in &expiries {
            let bars: Vec<ContractBar> = self
                .source
                .fetch(symbol, window.start(), window.fetch_end(), *expiry)
                .await
                .into_iter()
                .filter(|bar| window.contains(bar.date))
                .collect();

            if bars.is_empty() {
                warn!(symbol, expiry = %expiry, "No bars for contract, leg left empty");
                continue;
            }

            debug!(symbol, expiry = %expiry, bars = bars.len(), "Fetched contract");
            contracts.insert(*expiry, bars);
        }

        let series = assemble(&expiries, &contracts);
        info!(symbol, bars = series.len(), "Continuous series built");
        series
    }
}

/// Builds the continuous series for `symbol` with the default expiry count.
pub async fn build_continuous_series(
    symbol: &str,
    window: &SeriesWindow,
    source: &dyn ContractDataSource,
) -> Vec<ContinuousBar> {
    ContinuousSeriesBuilder::new(source).build(symbol, window).await
}

/// Current and near expiry for `date`, given expiries in ascending order.
///
/// Returns `None` when `date` is after every scheduled expiry.
#[must_use]
pub fn assign_legs(expiries: &[Expiry], date: NaiveDate) -> Option<(Expiry, Option<Expiry>)> {
    let idx = expiries.partition_point(|expiry| expiry.date() < date);
    let current = *expiries.get(idx)?;
    Some((current, expiries.get(idx + 1).copied()))
}

/// Merges per-contract bars into the continuous series.
///
/// Trading dates are the union of dates present in any contract. Rows where
/// both legs remain empty after forward-fill are dropped.
#[must_use]
pub fn assemble(
    expiries: &[Expiry],
    contracts: &BTreeMap<Expiry, Vec<ContractBar>>,
) -> Vec<ContinuousBar> {
    let mut schedule = expiries.to_vec();
    schedule.sort_unstable();
    schedule.dedup();

    let closes: BTreeMap<Expiry, BTreeMap<NaiveDate, Decimal>> = contracts
        .iter()
        .map(|(expiry, bars)| {
            let mut by_date = BTreeMap::new();
            for bar in bars {
                by_date.entry(bar.date).or_insert(bar.close);
            }
            (*expiry, by_date)
        })
        .collect();

    let trading_dates: BTreeSet<NaiveDate> = closes
        .values()
        .flat_map(|by_date| by_date.keys().copied())
        .collect();

    let close_on = |expiry: Expiry, date: NaiveDate| -> Option<Decimal> {
        closes.get(&expiry).and_then(|by_date| by_date.get(&date)).copied()
    };

    let mut current_leg = SegmentFill::default();
    let mut near_leg = SegmentFill::default();
    let mut series = Vec::with_capacity(trading_dates.len());

    for date in trading_dates {
        let Some((current_expiry, near_expiry)) = assign_legs(&schedule, date) else {
            continue;
        };

        let current_close = current_leg.observe(current_expiry, close_on(current_expiry, date));
        let near_close = match near_expiry {
            Some(expiry) => near_leg.observe(expiry, close_on(expiry, date)),
            None => {
                near_leg = SegmentFill::default();
                None
            }
        };

        if current_close.is_none() && near_close.is_none() {
            continue;
        }

        series.push(ContinuousBar::new(
            date,
            current_close,
            near_close,
            current_expiry,
            near_expiry,
        ));
    }

    series
}

/// Forward-fill state for one leg, reset whenever the leg's contract changes.
#[derive(Debug, Default)]
struct SegmentFill {
    contract: Option<Expiry>,
    last_close: Option<Decimal>,
}

impl SegmentFill {
    fn observe(&mut self, contract: Expiry, close: Option<Decimal>) -> Option<Decimal> {
        if self.contract != Some(contract) {
            self.contract = Some(contract);
            self.last_close = None;
        }
        if close.is_some() {
            self.last_close = close;
        }
        self.last_close
    }
}
