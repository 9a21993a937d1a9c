pub mod stats;
pub mod trade_log;

pub use stats::{GroupStats, TradeStats};
pub use trade_log::{TradeLog, TradeLogError};
