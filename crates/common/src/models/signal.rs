use std::fmt;

use serde::{Deserialize, Serialize};

/// The named boolean conditions that can contribute to a score, in
/// evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EmaAlignment,
    EmaCross,
    MacdCross,
    RsiRecovery,
    VolumeSpike,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        SignalKind::EmaAlignment,
        SignalKind::EmaCross,
        SignalKind::MacdCross,
        SignalKind::RsiRecovery,
        SignalKind::VolumeSpike,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SignalKind::EmaAlignment => "ema_alignment",
            SignalKind::EmaCross => "ema_cross",
            SignalKind::MacdCross => "macd_cross",
            SignalKind::RsiRecovery => "rsi_recovery",
            SignalKind::VolumeSpike => "volume_spike",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalKind::EmaAlignment => "EMA alignment bullish",
            SignalKind::EmaCross => "EMA9 crossed above EMA21",
            SignalKind::MacdCross => "MACD bullish crossover",
            SignalKind::RsiRecovery => "RSI recovery",
            SignalKind::VolumeSpike => "Volume spike",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Bear,
}

impl MarketRegime {
    pub fn from_mean_return(mean_return: f64) -> Self {
        if mean_return > 0.0 {
            MarketRegime::Bull
        } else {
            MarketRegime::Bear
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bull => f.write_str("bull"),
            MarketRegime::Bear => f.write_str("bear"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub symbol: String,
    pub timeframe: String,
    pub score: f64,
    pub signals: Vec<SignalKind>,
    pub regime: MarketRegime,
    pub trend_strength: f64,
    /// Weighted score across the configured timeframes, when computed.
    pub confluence: Option<f64>,
}

impl ScoredCandidate {
    /// Fired signal ids joined in evaluation order, e.g. `ema_cross+volume_spike`.
    pub fn signal_combo(&self) -> String {
        if self.signals.is_empty() {
            return "none".to_string();
        }
        self.signals
            .iter()
            .map(|s| s.id())
            .collect::<Vec<_>>()
            .join("+")
    }
}
