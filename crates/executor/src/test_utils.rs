use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::errors::ScanError;
use common::models::{InstrumentSeries, PriceBar};
use market_data::MarketDataSource;
use mockall::mock;

use crate::services::telegram_service::Notifier;

mock! {
    pub Source {}

    #[async_trait]
    impl MarketDataSource for Source {
        async fn list_universe(&self) -> Result<Vec<String>, ScanError>;
        async fn fetch(
            &self,
            symbol: &str,
            timeframe: &str,
            limit: usize,
        ) -> Result<InstrumentSeries, ScanError>;
        async fn latest_price(&self, symbol: &str) -> Result<f64, ScanError>;
    }
}

/// Steady 0.5% per bar uptrend with a 1% high/low band. Scores EMA
/// alignment plus the ADX bonus; `spike` adds a volume spike on the last bar.
pub fn trending_series(symbol: &str, timeframe: &str, spike: bool) -> InstrumentSeries {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut bars: Vec<PriceBar> = (0..120)
        .map(|i| {
            let close = 10.0 * 1.005_f64.powi(i);
            PriceBar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    if spike {
        if let Some(last) = bars.last_mut() {
            last.volume = 5_000.0;
        }
    }
    InstrumentSeries::new(symbol, timeframe, bars)
}

pub fn short_series(symbol: &str, timeframe: &str) -> InstrumentSeries {
    let mut series = trending_series(symbol, timeframe, false);
    series.bars.truncate(20);
    series
}

/// Collects every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, text: &str) -> Result<(), ScanError> {
        if self.fail {
            return Err(ScanError::NotificationFailure("chat unreachable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_string());
        }
        Ok(())
    }
}

/// Answers every fetch at once except for `slow_symbol`, which stalls for `delay`.
pub struct SlowSource {
    pub slow_symbol: String,
    pub delay: std::time::Duration,
}

#[async_trait]
impl MarketDataSource for SlowSource {
    async fn list_universe(&self) -> Result<Vec<String>, ScanError> {
        Ok(vec![self.slow_symbol.clone()])
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        _limit: usize,
    ) -> Result<InstrumentSeries, ScanError> {
        if symbol == self.slow_symbol {
            tokio::time::sleep(self.delay).await;
        }
        Ok(trending_series(symbol, timeframe, false))
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ScanError> {
        if symbol == self.slow_symbol {
            tokio::time::sleep(self.delay).await;
        }
        Ok(1.0)
    }
}
