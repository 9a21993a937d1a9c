use async_trait::async_trait;
use common::errors::ScanError;
use common::models::InstrumentSeries;

/// Where bars and prices come from.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Exchange symbols to scan this cycle, most liquid first.
    async fn list_universe(&self) -> Result<Vec<String>, ScanError>;

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<InstrumentSeries, ScanError>;

    async fn latest_price(&self, symbol: &str) -> Result<f64, ScanError>;
}

/// Conversion of a raw exchange payload into a domain value.
pub trait RemoteResponse<T> {
    fn to_model(&self) -> Result<T, ScanError>;
}
