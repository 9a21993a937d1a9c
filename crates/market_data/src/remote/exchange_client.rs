use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use common::config::ScannerConfig;
use common::errors::ScanError;
use common::models::{InstrumentSeries, PriceBar};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{KlineRow, PriceTicker, Ticker24h};
use crate::traits::{MarketDataSource, RemoteResponse};

const MAX_RETRIES: u32 = 3;
const USED_WEIGHT_HEADER: &str = "x-mbx-used-weight-1m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Mexc,
    Binance,
}

impl FromStr for Exchange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mexc" => Ok(Exchange::Mexc),
            "binance" => Ok(Exchange::Binance),
            other => Err(ScanError::unavailable(other, "unsupported exchange")),
        }
    }
}

impl Exchange {
    pub fn base_url(self) -> &'static str {
        match self {
            Exchange::Mexc => "https://api.mexc.com",
            Exchange::Binance => "https://api.binance.com",
        }
    }

    /// Exchange-specific spelling of a timeframe.
    pub fn interval(self, timeframe: &str) -> String {
        match (self, timeframe) {
            (Exchange::Mexc, "1h") => "60m".to_string(),
            (Exchange::Mexc, "1w") => "1W".to_string(),
            _ => timeframe.to_string(),
        }
    }
}

/// Which pairs make up the scan universe.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseFilter {
    pub quote_currency: String,
    pub excluded: Vec<String>,
    pub min_quote_volume: f64,
    pub limit: usize,
}

impl UniverseFilter {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            quote_currency: config.quote_currency.to_ascii_uppercase(),
            excluded: config
                .excluded_coins
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            min_quote_volume: config.min_volume_usd,
            limit: config.top_coins_limit,
        }
    }

    /// Keeps quote pairs that are not excluded and trade enough volume,
    /// most liquid first, capped at `limit`.
    pub fn select(&self, tickers: &[Ticker24h]) -> Vec<String> {
        let mut pairs: Vec<(&str, f64)> = tickers
            .iter()
            .filter_map(|t| {
                let base = t.symbol.strip_suffix(&self.quote_currency)?;
                if base.is_empty() || self.excluded.iter().any(|e| e == base) {
                    return None;
                }
                let volume = t.quote_volume();
                (volume >= self.min_quote_volume).then_some((t.symbol.as_str(), volume))
            })
            .collect();

        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs
            .into_iter()
            .take(self.limit)
            .map(|(symbol, _)| symbol.to_string())
            .collect()
    }
}

#[derive(Debug, Error)]
enum RequestError {
    #[error("HTTP {0}: rate limited")]
    RateLimited(StatusCode),
    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// REST client for Binance-compatible spot market data.
#[derive(Clone)]
pub struct ExchangeClient {
    client: Client,
    exchange: Exchange,
    base_url: String,
    quote_currency: String,
    filter: UniverseFilter,
}

impl ExchangeClient {
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        let exchange: Exchange = config.exchange.parse()?;
        let client = Client::builder()
            .user_agent("altcoin_scanner/0.1.0")
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| ScanError::unavailable(&config.exchange, e))?;

        Ok(Self {
            client,
            exchange,
            base_url: exchange.base_url().to_string(),
            quote_currency: config.quote_currency.to_ascii_uppercase(),
            filter: UniverseFilter::from_config(config),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `SOL` and `SOL/USDT` both become `SOLUSDT`.
    pub fn normalize_symbol(&self, symbol: &str) -> String {
        let upper = symbol.trim().to_ascii_uppercase();
        if upper.contains('/') {
            return upper.replace('/', "");
        }
        if upper.ends_with(&self.quote_currency) && upper.len() > self.quote_currency.len() {
            upper
        } else {
            format!("{}{}", upper, self.quote_currency)
        }
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let url = format!("{}{}", self.base_url, path);
        let mut retry_count = 0;

        loop {
            match self.make_request(&url, query).await {
                Ok(data) => return Ok(data),
                Err(RequestError::RateLimited(status)) if retry_count < MAX_RETRIES => {
                    retry_count += 1;
                    let backoff_seconds = 2_u64.pow(retry_count);
                    warn!(
                        "Rate limited ({}) on {}, backing off for {} seconds (attempt {}/{})",
                        status, path, backoff_seconds, retry_count, MAX_RETRIES
                    );
                    sleep(Duration::from_secs(backoff_seconds)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn make_request<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(RequestError::RateLimited(status));
        }

        if let Some(used_weight) = response
            .headers()
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
        {
            if used_weight > 1000 {
                warn!("High API weight usage: {}", used_weight);
            } else {
                debug!("Used weights: {}/1200", used_weight);
            }
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status(status, body));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarketDataSource for ExchangeClient {
    async fn list_universe(&self) -> Result<Vec<String>, ScanError> {
        let tickers: Vec<Ticker24h> = self
            .get_with_retry("/api/v3/ticker/24hr", &[])
            .await
            .map_err(|e| ScanError::unavailable("universe", e))?;

        let universe = self.filter.select(&tickers);
        debug!(
            "Universe: {} of {} tickers selected on {:?}",
            universe.len(),
            tickers.len(),
            self.exchange
        );
        Ok(universe)
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<InstrumentSeries, ScanError> {
        let symbol = self.normalize_symbol(symbol);
        let query = [
            ("symbol", symbol.clone()),
            ("interval", self.exchange.interval(timeframe)),
            ("limit", limit.to_string()),
        ];

        let rows: Vec<KlineRow> = self
            .get_with_retry("/api/v3/klines", &query)
            .await
            .map_err(|e| ScanError::unavailable(&symbol, e))?;

        if rows.is_empty() {
            return Err(ScanError::unavailable(&symbol, "no klines returned"));
        }

        let bars = rows
            .iter()
            .map(|row| row.to_model())
            .collect::<Result<Vec<PriceBar>, _>>()
            .map_err(|e| ScanError::unavailable(&symbol, e))?;

        Ok(InstrumentSeries::new(symbol, timeframe, bars))
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, ScanError> {
        let symbol = self.normalize_symbol(symbol);
        let ticker: PriceTicker = self
            .get_with_retry("/api/v3/ticker/price", &[("symbol", symbol.clone())])
            .await
            .map_err(|e| ScanError::unavailable(&symbol, e))?;
        ticker.to_model()
    }
}
