use common::errors::ScanError;
use serde::Deserialize;
use serde_json::Value;

use super::value_f64;
use crate::traits::RemoteResponse;

/// Entry of `/api/v3/ticker/24hr`.
#[derive(Debug, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(rename(deserialize = "quoteVolume"), default)]
    pub quote_volume: Value,
}

impl Ticker24h {
    pub fn quote_volume(&self) -> f64 {
        value_f64(&self.quote_volume).unwrap_or(0.0)
    }
}

/// Reply of `/api/v3/ticker/price?symbol=...`.
#[derive(Debug, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    pub price: Value,
}

impl RemoteResponse<f64> for PriceTicker {
    fn to_model(&self) -> Result<f64, ScanError> {
        value_f64(&self.price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| ScanError::unavailable(&self.symbol, "no usable price"))
    }
}
