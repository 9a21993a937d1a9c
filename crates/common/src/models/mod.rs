pub mod bar;
pub mod signal;
pub mod snapshot;
pub mod trade;

pub use bar::{InstrumentSeries, PriceBar};
pub use signal::{MarketRegime, ScoredCandidate, SignalKind};
pub use snapshot::IndicatorSnapshot;
pub use trade::{LoggedTrade, TradeOutcome, TradePlan};
