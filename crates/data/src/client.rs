//! NSE REST client with rate limiting, retries and session handling.
//!
//! Every request waits on a governor rate limiter, carries the session
//! cookies from [`SessionManager`], and is retried with exponential backoff
//! on transient failures. A 401 or 403 invalidates the session so the retry
//! runs with fresh cookies.

use crate::error::{NseError, Result};
use crate::session::{browser_headers, SessionManager};
use calspread_core::{ContractBar, Expiry, NseConfig, Underlying};
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// Constants
// =============================================================================

/// Historical futures bars for one contract.
pub const HISTORICAL_PATH: &str = "/api/historical/fo/derivatives";

/// Instruments with listed derivatives.
pub const UNDERLYINGS_PATH: &str = "/api/underlying-information";

/// Instrument type for single-stock futures.
pub const STOCK_FUTURES: &str = "FUTSTK";

/// Date format used in request query parameters.
const QUERY_DATE_FORMAT: &str = "%d-%m-%Y";

/// Date format of `FH_TIMESTAMP` in responses.
const ROW_DATE_FORMAT: &str = "%d-%b-%Y";

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawHistoricalResponse {
    #[serde(default)]
    data: Vec<RawContractRow>,
}

/// One row of the historical derivatives response.
///
/// Numeric fields arrive as numbers or as strings with thousands separators.
#[derive(Debug, Deserialize)]
struct RawContractRow {
    #[serde(rename = "FH_TIMESTAMP")]
    timestamp: Option<String>,
    #[serde(rename = "FH_OPENING_PRICE", default)]
    open: Value,
    #[serde(rename = "FH_HIGH_PRICE", default)]
    high: Value,
    #[serde(rename = "FH_LOW_PRICE", default)]
    low: Value,
    #[serde(rename = "FH_CLOSING_PRICE", default)]
    close: Value,
    #[serde(rename = "FH_TOT_TRADED_QTY", default)]
    volume: Value,
    #[serde(rename = "FH_OPEN_INT", default)]
    open_interest: Value,
    #[serde(rename = "FH_SETTLE_PRICE", default)]
    settlement_price: Value,
}

impl RawContractRow {
    /// Converts the row, or `None` when the date or close is unusable.
    fn into_bar(self) -> Option<ContractBar> {
        let date = NaiveDate::parse_from_str(self.timestamp?.trim(), ROW_DATE_FORMAT).ok()?;
        let close = parse_number(&self.close)?;

        Some(ContractBar {
            date,
            open: parse_number(&self.open).unwrap_or(close),
            high: parse_number(&self.high).unwrap_or(close),
            low: parse_number(&self.low).unwrap_or(close),
            close,
            volume: parse_number(&self.volume).unwrap_or_default(),
            open_interest: parse_number(&self.open_interest).unwrap_or_default(),
            settlement_price: parse_number(&self.settlement_price).unwrap_or(close),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawUnderlyingResponse {
    data: RawUnderlyingData,
}

#[derive(Debug, Deserialize)]
struct RawUnderlyingData {
    #[serde(rename = "UnderlyingList", default)]
    underlying_list: Vec<RawUnderlying>,
}

#[derive(Debug, Deserialize)]
struct RawUnderlying {
    symbol: String,
    #[serde(default)]
    underlying: String,
}

/// Parses an NSE numeric field: a JSON number or a string like `"1,234.50"`.
fn parse_number(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() || cleaned == "-" {
                None
            } else {
                Decimal::from_str(cleaned).ok()
            }
        }
        _ => None,
    }
}

// =============================================================================
// Client
// =============================================================================

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct NseClient {
    config: NseConfig,
    http: Client,
    session: Arc<SessionManager>,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl std::fmt::Debug for NseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NseClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_second", &self.config.requests_per_second)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl NseClient {
    /// Creates a client that authenticates through `session`.
    ///
    /// # Errors
    /// Returns `NseError::Network` if the HTTP client cannot be built.
    pub fn new(config: NseConfig, session: Arc<SessionManager>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(browser_headers())
            .build()
            .map_err(|e| NseError::Network(format!("failed to build HTTP client: {e}")))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            config,
            http,
            session,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Daily bars of one futures contract between `from` and `to`, sorted by date.
    ///
    /// # Errors
    /// Returns the last error once retries are exhausted, or immediately for
    /// non-transient failures.
    pub async fn fetch_contract(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        expiry: Expiry,
    ) -> Result<Vec<ContractBar>> {
        let query = [
            ("from", from.format(QUERY_DATE_FORMAT).to_string()),
            ("to", to.format(QUERY_DATE_FORMAT).to_string()),
            ("expiryDate", expiry.to_string()),
            ("instrumentType", STOCK_FUTURES.to_string()),
            ("symbol", symbol.to_string()),
        ];

        let referer = format!("{}/get-quotes/derivatives?symbol={symbol}", self.base_url());
        let response: RawHistoricalResponse = self
            .get_json(HISTORICAL_PATH, &query, Some(referer.as_str()))
            .await?;

        let mut bars: Vec<ContractBar> = response
            .data
            .into_iter()
            .filter_map(RawContractRow::into_bar)
            .collect();
        bars.sort_by_key(|bar| bar.date);

        debug!(symbol, expiry = %expiry, bars = bars.len(), "Fetched contract bars");
        Ok(bars)
    }

    /// Instruments with listed stock derivatives. Index underlyings are excluded.
    ///
    /// # Errors
    /// Returns an error if the request fails after retries.
    pub async fn underlyings(&self) -> Result<Vec<Underlying>> {
        let response: RawUnderlyingResponse = self.get_json(UNDERLYINGS_PATH, &[], None).await?;

        Ok(response
            .data
            .underlying_list
            .into_iter()
            .map(|raw| Underlying::new(raw.symbol.trim(), raw.underlying.trim()))
            .collect())
    }

    /// GET with retries. Backoff doubles from `retry_base_delay_ms`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(path, query, referer).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        path,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "NSE request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        referer: Option<&str>,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let cookie = self.session.cookie_header().await?;
        let url = format!("{}{}", self.base_url(), path);

        debug!("GET {}", url);

        let mut request = self.http.get(&url).query(query).header(COOKIE, &cookie);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.session.invalidate(&cookie).await;
            return Err(NseError::SessionExpired {
                status_code: status.as_u16(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NseError::api(status.as_u16(), text));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(self.config.retry_base_delay_ms.saturating_mul(factor))
    }
}
