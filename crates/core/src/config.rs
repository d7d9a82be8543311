use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nse: NseConfig,
    pub backtest: BacktestConfig,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NseConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub cookie_max_age_secs: u64,
    pub requests_per_second: u32,
    pub cache_dir: String,
    /// Serve current and future expiries from cache too.
    pub use_cache_for_future: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub history_days: u32,
    pub lookahead_days: u32,
    pub expiry_count: usize,
    pub stop_loss_fraction: f64,
    pub testing_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub workers: usize,
    pub instrument_timeout_secs: u64,
    pub limit: Option<usize>,
}

impl Default for NseConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.nseindia.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            cookie_max_age_secs: 600,
            requests_per_second: 3,
            cache_dir: "cache".to_string(),
            use_cache_for_future: false,
        }
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            history_days: 200,
            lookahead_days: 31,
            expiry_count: 9,
            stop_loss_fraction: 0.75,
            testing_window: 150,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            instrument_timeout_secs: 300,
            limit: None,
        }
    }
}
