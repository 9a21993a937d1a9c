use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::MarketRegime;

/// Entry, stop and the two take-profit tiers for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit1: f64,
    pub take_profit2: f64,
    pub risk_reward1: f64,
    pub risk_reward2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
    Pending,
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Win => f.write_str("win"),
            TradeOutcome::Loss => f.write_str("loss"),
            TradeOutcome::Pending => f.write_str("pending"),
        }
    }
}

/// One row of the simulated trade log. Field order is the file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedTrade {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub entry_price: f64,
    pub tp_price: f64,
    pub sl_price: f64,
    pub outcome: TradeOutcome,
    pub signal_combo: String,
    pub rr_ratio: Option<f64>,
    pub market_regime: MarketRegime,
    pub trend_strength: f64,
}
