use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronological bars of one symbol on one timeframe, as fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSeries {
    pub symbol: String,
    pub timeframe: String,
    pub bars: Vec<PriceBar>,
}

impl InstrumentSeries {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            bars,
        }
    }
}
