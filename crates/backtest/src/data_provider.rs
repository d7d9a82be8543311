use anyhow::{Context, Result};
use async_trait::async_trait;
use calspread_core::{
    ContractBar, ContractDataSource, Expiry, Underlying, UnderlyingSource,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::str::FromStr;

/// In-memory contract history, typically loaded from CSV.
///
/// Serves offline backtests and tests through the same interface as the
/// live exchange source.
#[derive(Debug, Clone, Default)]
pub struct HistoricalContractSource {
    contracts: HashMap<String, BTreeMap<Expiry, Vec<ContractBar>>>,
}

impl HistoricalContractSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one bar, keeping each contract sorted by date.
    pub fn insert(&mut self, symbol: &str, expiry: Expiry, bar: ContractBar) {
        let bars = self
            .contracts
            .entry(symbol.to_uppercase())
            .or_default()
            .entry(expiry)
            .or_default();
        let idx = bars.partition_point(|existing| existing.date <= bar.date);
        bars.insert(idx, bar);
    }

    /// Adds a whole contract.
    #[must_use]
    pub fn with_contract(mut self, symbol: &str, expiry: Expiry, bars: Vec<ContractBar>) -> Self {
        for bar in bars {
            self.insert(symbol, expiry, bar);
        }
        self
    }

    /// Loads contract bars from a CSV file.
    ///
    /// Expected header:
    /// `symbol,expiry,date,open,high,low,close,volume,open_interest,settlement_price`.
    /// Expiries may be `DD-Mon-YYYY` or `YYYY-MM-DD`; dates are `YYYY-MM-DD`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The CSV file cannot be opened
    /// - A row has too few columns
    /// - Date, expiry or decimal parsing fails
    pub fn from_csv(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
        Self::from_reader(file)
    }

    /// Loads contract bars from any CSV reader. See [`Self::from_csv`].
    ///
    /// # Errors
    ///
    /// Returns an error if a record is malformed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut source = Self::new();

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let field = |idx: usize| -> Result<&str> {
                record
                    .get(idx)
                    .map(str::trim)
                    .with_context(|| format!("row {}: missing column {idx}", line + 1))
            };
            let decimal = |idx: usize| -> Result<Decimal> {
                let raw = field(idx)?;
                Decimal::from_str(raw).with_context(|| format!("row {}: bad decimal {raw:?}", line + 1))
            };

            let symbol = field(0)?.to_string();
            let expiry = Expiry::from_str(field(1)?)?;
            let date = NaiveDate::parse_from_str(field(2)?, "%Y-%m-%d")
                .with_context(|| format!("row {}: bad date", line + 1))?;

            let bar = ContractBar {
                date,
                open: decimal(3)?,
                high: decimal(4)?,
                low: decimal(5)?,
                close: decimal(6)?,
                volume: decimal(7)?,
                open_interest: decimal(8)?,
                settlement_price: decimal(9)?,
            };
            source.insert(&symbol, expiry, bar);
        }

        Ok(source)
    }

    /// Symbols with at least one contract, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.contracts.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

#[async_trait]
impl ContractDataSource for HistoricalContractSource {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expiry: Expiry,
    ) -> Vec<ContractBar> {
        self.contracts
            .get(&symbol.to_uppercase())
            .and_then(|by_expiry| by_expiry.get(&expiry))
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.date >= start && bar.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl UnderlyingSource for HistoricalContractSource {
    async fn underlyings(&self) -> Result<Vec<Underlying>> {
        Ok(self
            .symbols()
            .into_iter()
            .map(|symbol| Underlying::new(symbol.clone(), symbol))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calspread_core::last_thursday;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const CSV: &str = "\
symbol,expiry,date,open,high,low,close,volume,open_interest,settlement_price
sbin,25-Jan-2024,2024-01-03,600,610,595,605.5,1000,20000,605.5
SBIN,2024-01-25,2024-01-02,598,602,590,600,900,19000,600
SBIN,29-Feb-2024,2024-01-02,603,607,600,604.25,100,3000,604.25
INFY,25-Jan-2024,2024-01-02,1500,1510,1490,1505,50,700,1505
";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn loads_contracts_sorted_by_date() {
        let source = HistoricalContractSource::from_reader(CSV.as_bytes()).unwrap();

        let jan = source
            .fetch("SBIN", date(2024, 1, 1), date(2024, 1, 31), last_thursday(2024, 1))
            .await;

        assert_eq!(jan.len(), 2);
        assert_eq!(jan[0].date, date(2024, 1, 2));
        assert_eq!(jan[1].close, dec!(605.5));
        assert_eq!(jan[1].open_interest, dec!(20000));
    }

    #[tokio::test]
    async fn fetch_filters_by_range_and_symbol() {
        let source = HistoricalContractSource::from_reader(CSV.as_bytes()).unwrap();

        let bars = source
            .fetch("sbin", date(2024, 1, 3), date(2024, 1, 3), last_thursday(2024, 1))
            .await;
        assert_eq!(bars.len(), 1);

        let missing = source
            .fetch("TCS", date(2024, 1, 1), date(2024, 1, 31), last_thursday(2024, 1))
            .await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn underlyings_list_loaded_symbols() {
        let source = HistoricalContractSource::from_reader(CSV.as_bytes()).unwrap();

        let underlyings = source.underlyings().await.unwrap();

        let symbols: Vec<_> = underlyings.iter().map(|u| u.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["INFY", "SBIN"]);
    }

    #[test]
    fn from_csv_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let source = HistoricalContractSource::from_csv(file.path().to_str().unwrap()).unwrap();

        assert_eq!(source.symbols().len(), 2);
    }

    #[test]
    fn malformed_decimal_is_an_error() {
        let bad = "symbol,expiry,date,open,high,low,close,volume,open_interest,settlement_price\n\
                   SBIN,25-Jan-2024,2024-01-02,x,1,1,1,1,1,1\n";

        let err = HistoricalContractSource::from_reader(bad.as_bytes()).unwrap_err();

        assert!(err.to_string().contains("bad decimal"));
    }
}
