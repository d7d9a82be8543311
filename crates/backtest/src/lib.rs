pub mod continuous;
pub mod data_provider;
pub mod metrics;
pub mod spread;

pub use continuous::{assemble, assign_legs, build_continuous_series, ContinuousSeriesBuilder};
pub use data_provider::HistoricalContractSource;
pub use metrics::TradeStatistics;
pub use spread::{
    run_backtest, AnnotatedBar, BacktestParams, BacktestResult, BarAnnotation, SpreadBacktester,
    DEFAULT_STOP_LOSS_FRACTION, DEFAULT_TESTING_WINDOW,
};
