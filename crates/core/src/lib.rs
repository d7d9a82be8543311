//! Core types for calendar-spread research on monthly stock futures.
//!
//! Holds the expiry calendar, bar and trade types, the signal label and the
//! data-source traits the builder and scanner depend on.

pub mod bars;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod expiry;
pub mod signal;
pub mod trade;
pub mod traits;

pub use bars::{
    ContinuousBar, ContractBar, SeriesWindow, Underlying, DEFAULT_HISTORY_DAYS,
    DEFAULT_LOOKAHEAD_DAYS,
};
pub use config::{AppConfig, BacktestConfig, NseConfig, ScannerConfig};
pub use config_loader::ConfigLoader;
pub use error::CoreError;
pub use expiry::{expiries_covering, front_expiry, last_thursday, Expiry, DEFAULT_EXPIRY_COUNT};
pub use signal::Signal;
pub use trade::{SpreadBounds, SpreadSide, Trade, TradeResult, TradeState};
pub use traits::{ContractDataSource, UnderlyingSource};
