use crate::bars::{ContractBar, Underlying};
use crate::expiry::Expiry;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Per-contract daily bars, keyed by symbol and expiry.
///
/// Implementations return bars ordered by date and an empty vector when no
/// data is available. Transport failures are handled inside the source and
/// surface here as an empty result.
#[async_trait]
pub trait ContractDataSource: Send + Sync {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expiry: Expiry,
    ) -> Vec<ContractBar>;
}

/// Supplies the instruments a scan iterates over.
#[async_trait]
pub trait UnderlyingSource: Send + Sync {
    async fn underlyings(&self) -> Result<Vec<Underlying>>;
}
