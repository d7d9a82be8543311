pub mod report;
pub mod scanner;

pub use report::{rank_reports, InstrumentReport};
pub use scanner::{analyze_instrument, ScanSettings, Scanner};
