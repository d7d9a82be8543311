//! NSE-backed implementation of the core data-source traits.

use crate::cache::ContractCache;
use crate::client::NseClient;
use crate::session::SessionManager;
use anyhow::Result;
use async_trait::async_trait;
use calspread_core::{ContractBar, ContractDataSource, Expiry, NseConfig, Underlying, UnderlyingSource};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches contracts from NSE through a local cache.
///
/// Expiries in a month before the current one never change and are served
/// from cache when present; newer contracts always hit the network unless
/// `use_cache_for_future` is set. Only contracts the cache may serve are
/// written back. Fetch failures are logged and returned as an empty result.
#[derive(Debug)]
pub struct NseDataSource {
    client: NseClient,
    cache: ContractCache,
    use_cache_for_future: bool,
    today: Option<NaiveDate>,
}

impl NseDataSource {
    #[must_use]
    pub fn new(client: NseClient, cache: ContractCache, use_cache_for_future: bool) -> Self {
        Self {
            client,
            cache,
            use_cache_for_future,
            today: None,
        }
    }

    /// Builds the client and cache from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &NseConfig, session: Arc<SessionManager>) -> Result<Self> {
        let client = NseClient::new(config.clone(), session)?;
        let cache = ContractCache::new(&config.cache_dir);
        Ok(Self::new(client, cache, config.use_cache_for_future))
    }

    /// Pins the date used by the cache policy.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    #[must_use]
    pub const fn client(&self) -> &NseClient {
        &self.client
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn is_cacheable(&self, expiry: Expiry) -> bool {
        self.use_cache_for_future || expiry.is_before_month_of(self.today())
    }
}

#[async_trait]
impl ContractDataSource for NseDataSource {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        expiry: Expiry,
    ) -> Vec<ContractBar> {
        let cacheable = self.is_cacheable(expiry);
        if cacheable {
            match self.cache.load(symbol, expiry).await {
                Ok(Some(bars)) => {
                    debug!(symbol, expiry = %expiry, "Serving contract from cache");
                    return bars
                        .into_iter()
                        .filter(|bar| bar.date >= start && bar.date <= end)
                        .collect();
                }
                Ok(None) => {}
                Err(e) => warn!(symbol, expiry = %expiry, error = %e, "Ignoring unreadable cache"),
            }
        }

        match self.client.fetch_contract(symbol, start, end, expiry).await {
            Ok(bars) => {
                if cacheable {
                    if let Err(e) = self.cache.store(symbol, expiry, &bars).await {
                        warn!(symbol, expiry = %expiry, error = %e, "Failed to cache contract");
                    }
                }
                bars
            }
            Err(e) => {
                warn!(symbol, expiry = %expiry, error = %e, "Contract fetch failed, leaving leg empty");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl UnderlyingSource for NseDataSource {
    async fn underlyings(&self) -> Result<Vec<Underlying>> {
        Ok(self.client.underlyings().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HISTORICAL_PATH;
    use calspread_core::last_thursday;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn source(server: &MockServer, cache_dir: &std::path::Path, use_cache_for_future: bool) -> NseDataSource {
        source_as_of(server, cache_dir, use_cache_for_future, date(2024, 3, 15)).await
    }

    async fn source_as_of(
        server: &MockServer,
        cache_dir: &std::path::Path,
        use_cache_for_future: bool,
        today: NaiveDate,
    ) -> NseDataSource {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "nsit=s1"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get-quotes/derivatives"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;

        let config = NseConfig {
            base_url: server.uri(),
            cache_dir: cache_dir.to_string_lossy().into_owned(),
            use_cache_for_future,
            retry_base_delay_ms: 1,
            max_retries: 1,
            requests_per_second: 1000,
            ..NseConfig::default()
        };
        let session = Arc::new(SessionManager::new(&config).unwrap());
        NseDataSource::from_config(&config, session)
            .unwrap()
            .with_today(today)
    }

    fn one_row() -> serde_json::Value {
        json!({
            "data": [{
                "FH_TIMESTAMP": "02-Jan-2024",
                "FH_OPENING_PRICE": "600",
                "FH_HIGH_PRICE": "605",
                "FH_LOW_PRICE": "598",
                "FH_CLOSING_PRICE": "603.5",
                "FH_TOT_TRADED_QTY": "1000",
                "FH_OPEN_INT": "20000",
                "FH_SETTLE_PRICE": "603.5"
            }]
        })
    }

    #[tokio::test]
    async fn past_expiry_is_fetched_once_then_served_from_cache() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = source(&server, dir.path(), false).await;

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .and(query_param("expiryDate", "25-Jan-2024"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
            .expect(1)
            .mount(&server)
            .await;

        let jan = last_thursday(2024, 1);
        let first = source.fetch("SBIN", date(2024, 1, 1), date(2024, 2, 28), jan).await;
        let second = source.fetch("SBIN", date(2024, 1, 1), date(2024, 2, 28), jan).await;

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].close, dec!(603.5));
        assert_eq!(first, second);
        assert!(dir.path().join("SBIN.json").exists());
    }

    #[tokio::test]
    async fn current_month_expiry_always_hits_network() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = source(&server, dir.path(), false).await;

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
            .expect(2)
            .mount(&server)
            .await;

        let mar = last_thursday(2024, 3);
        source.fetch("SBIN", date(2024, 1, 1), date(2024, 3, 31), mar).await;
        source.fetch("SBIN", date(2024, 1, 1), date(2024, 3, 31), mar).await;
    }

    #[tokio::test]
    async fn current_month_contract_is_refetched_after_it_expires() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
            .expect(2)
            .mount(&server)
            .await;

        let mar = last_thursday(2024, 3);
        let during = source(&server, dir.path(), false).await;
        during.fetch("SBIN", date(2024, 1, 1), date(2024, 3, 31), mar).await;
        assert!(!dir.path().join("SBIN.json").exists());

        let after = source_as_of(&server, dir.path(), false, date(2024, 4, 10)).await;
        let bars = after.fetch("SBIN", date(2024, 1, 1), date(2024, 3, 31), mar).await;

        assert_eq!(bars.len(), 1);
        assert!(dir.path().join("SBIN.json").exists());
    }

    #[tokio::test]
    async fn future_expiries_use_cache_when_enabled() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = source(&server, dir.path(), true).await;

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
            .expect(1)
            .mount(&server)
            .await;

        let apr = last_thursday(2024, 4);
        source.fetch("SBIN", date(2024, 1, 1), date(2024, 4, 30), apr).await;
        source.fetch("SBIN", date(2024, 1, 1), date(2024, 4, 30), apr).await;
    }

    #[tokio::test]
    async fn cached_bars_are_filtered_to_requested_range() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = source(&server, dir.path(), false).await;

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
            .mount(&server)
            .await;

        let jan = last_thursday(2024, 1);
        source.fetch("SBIN", date(2024, 1, 1), date(2024, 1, 31), jan).await;
        let later = source.fetch("SBIN", date(2024, 1, 10), date(2024, 1, 31), jan).await;

        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_returns_empty_and_is_not_cached() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let source = source(&server, dir.path(), false).await;

        Mock::given(method("GET"))
            .and(path(HISTORICAL_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let bars = source
            .fetch("SBIN", date(2024, 1, 1), date(2024, 1, 31), last_thursday(2024, 1))
            .await;

        assert!(bars.is_empty());
        assert!(!dir.path().join("SBIN.json").exists());
    }
}
