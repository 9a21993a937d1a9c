use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::ScanError;
use crate::models::SignalKind;

pub const DEFAULT_OVERRIDE_PATH: &str = "dynamic_config.json";

/// Fewest bars every indicator of a snapshot needs: the 50-return regime
/// window plus the bar it starts from.
pub const MIN_SERIES_LEN: usize = 51;

/// Largest rounding precision that still fits an `f64` mantissa.
pub const MAX_PRICE_PRECISION: u32 = 15;

/// Weight each fired signal adds to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub ema_alignment: f64,
    pub ema_cross: f64,
    pub macd_cross: f64,
    pub rsi_recovery: f64,
    pub volume_spike: f64,
    /// ADX trend bonus. Adds to the score but is never listed as a signal.
    pub trend_bonus: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            ema_alignment: 0.8,
            ema_cross: 1.0,
            macd_cross: 1.5,
            rsi_recovery: 1.0,
            volume_spike: 1.2,
            trend_bonus: 0.5,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::EmaAlignment => self.ema_alignment,
            SignalKind::EmaCross => self.ema_cross,
            SignalKind::MacdCross => self.macd_cross,
            SignalKind::RsiRecovery => self.rsi_recovery,
            SignalKind::VolumeSpike => self.volume_spike,
        }
    }

    /// Highest score reachable when every condition fires.
    pub fn max_score(&self) -> f64 {
        SignalKind::ALL.iter().map(|k| self.weight(*k)).sum::<f64>() + self.trend_bonus
    }
}

/// Trigger parameters of the individual signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub rsi_recovery_level: f64,
    pub volume_spike_factor: f64,
    pub volume_window: usize,
    pub trend_adx: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            rsi_recovery_level: 40.0,
            volume_spike_factor: 1.8,
            volume_window: 20,
            trend_adx: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerParams {
    /// Premium over EMA21 the entry must at least reach.
    pub entry_premium: f64,
    pub atr_multiplier: f64,
    pub strong_trend_atr_multiplier: f64,
    pub strong_trend_adx: f64,
    pub reward_ratio1: f64,
    pub reward_ratio2: f64,
    pub price_precision: u32,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            entry_premium: 0.003,
            atr_multiplier: 2.0,
            strong_trend_atr_multiplier: 3.0,
            strong_trend_adx: 30.0,
            reward_ratio1: 3.0,
            reward_ratio2: 5.0,
            price_precision: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub exchange: String,
    pub quote_currency: String,
    pub top_coins_limit: usize,
    pub excluded_coins: Vec<String>,
    pub min_volume_usd: f64,
    /// Timeframe the trade plan is built on.
    pub timeframe: String,
    pub tf_weights: BTreeMap<String, f64>,
    pub ohlcv_limit: usize,
    /// Candidate gate: below it a symbol yields nothing.
    pub min_score: f64,
    /// Alert gate: the top candidate is pushed to the notifier only above it.
    pub alert_min_score: f64,
    pub signal_weights: SignalWeights,
    pub signal_params: SignalParams,
    pub planner: PlannerParams,
    pub scan_interval_secs: u64,
    pub max_workers: usize,
    pub fetch_timeout_secs: u64,
    pub top_k_logged: usize,
    pub trade_log_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            exchange: "mexc".to_string(),
            quote_currency: "USDT".to_string(),
            top_coins_limit: 150,
            excluded_coins: ["BTC", "ETH", "USDT", "USDC", "BUSD", "DAI", "TUSD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_volume_usd: 5_000_000.0,
            timeframe: "1h".to_string(),
            tf_weights: BTreeMap::from([
                ("15m".to_string(), 0.2),
                ("1h".to_string(), 0.35),
                ("4h".to_string(), 0.45),
            ]),
            ohlcv_limit: 200,
            min_score: 1.0,
            alert_min_score: 4.0,
            signal_weights: SignalWeights::default(),
            signal_params: SignalParams::default(),
            planner: PlannerParams::default(),
            scan_interval_secs: 300,
            max_workers: 10,
            fetch_timeout_secs: 15,
            top_k_logged: 5,
            trade_log_path: PathBuf::from("simulated_trades.csv"),
        }
    }
}

impl ScannerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        let fail = |msg: &str| Err(ScanError::ConfigMergeFailure(msg.to_string()));

        if self.timeframe.trim().is_empty() {
            return fail("timeframe must not be empty");
        }
        if self.max_workers == 0 {
            return fail("max_workers must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            return fail("fetch_timeout_secs must be at least 1");
        }
        let window = self.signal_params.volume_window;
        if window == 0 {
            return fail("volume_window must be at least 1");
        }
        if self.ohlcv_limit < MIN_SERIES_LEN.max(window) {
            return Err(ScanError::ConfigMergeFailure(format!(
                "ohlcv_limit {} is below the {} bars the indicators need",
                self.ohlcv_limit,
                MIN_SERIES_LEN.max(window)
            )));
        }
        if !self.min_score.is_finite() || !self.alert_min_score.is_finite() {
            return fail("score gates must be finite");
        }
        let w = &self.signal_weights;
        let weights = [
            w.ema_alignment,
            w.ema_cross,
            w.macd_cross,
            w.rsi_recovery,
            w.volume_spike,
            w.trend_bonus,
        ];
        if weights.iter().any(|v| !v.is_finite()) {
            return fail("signal weights must be finite");
        }
        if self.tf_weights.values().any(|v| !v.is_finite() || *v < 0.0) {
            return fail("timeframe weights must be finite and non-negative");
        }
        let p = &self.planner;
        if !(p.atr_multiplier > 0.0 && p.strong_trend_atr_multiplier > 0.0) {
            return fail("ATR multipliers must be positive");
        }
        if !(p.reward_ratio1 > 0.0 && p.reward_ratio2 > 0.0)
            || !(p.reward_ratio1.is_finite() && p.reward_ratio2.is_finite())
        {
            return fail("reward ratios must be positive");
        }
        if !p.entry_premium.is_finite() || p.entry_premium <= -1.0 {
            return fail("entry_premium must be finite and above -1");
        }
        if p.price_precision > MAX_PRICE_PRECISION {
            return fail("price_precision must be at most 15");
        }
        Ok(())
    }

    /// Applies an override document on top of this configuration.
    /// Top-level keys replace, nested maps merge key by key.
    pub fn merge_overrides(&self, overrides: &Value) -> Result<ScannerConfig, ScanError> {
        let Value::Object(patch) = overrides else {
            return Err(ScanError::ConfigMergeFailure(
                "override document must be a JSON object".to_string(),
            ));
        };

        let mut merged = serde_json::to_value(self)
            .map_err(|e| ScanError::ConfigMergeFailure(e.to_string()))?;

        if let Value::Object(target) = &mut merged {
            for (key, value) in patch {
                match (target.get_mut(key), value) {
                    (Some(Value::Object(existing)), Value::Object(nested)) => {
                        for (k, v) in nested {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        let config: ScannerConfig = serde_json::from_value(merged)
            .map_err(|e| ScanError::ConfigMergeFailure(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builds the configuration of one scan cycle from the base values and the
/// optional override document.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base: ScannerConfig,
    override_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(base: ScannerConfig, override_path: impl Into<PathBuf>) -> Self {
        Self {
            base,
            override_path: override_path.into(),
        }
    }

    pub fn from_env() -> Self {
        let path = env::var("SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_OVERRIDE_PATH.to_string());
        Self::new(ScannerConfig::default(), path)
    }

    pub fn override_path(&self) -> &Path {
        &self.override_path
    }

    pub fn base(&self) -> &ScannerConfig {
        &self.base
    }

    /// Never fails: a broken override document falls back to the base.
    pub fn load(&self) -> ScannerConfig {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Ignoring override document {}: {}",
                    self.override_path.display(),
                    e
                );
                self.base.clone()
            }
        }
    }

    pub fn try_load(&self) -> Result<ScannerConfig, ScanError> {
        if !self.override_path.exists() {
            debug!(
                "No override document at {}, using base config",
                self.override_path.display()
            );
            return Ok(self.base.clone());
        }

        let raw = fs::read_to_string(&self.override_path)
            .map_err(|e| ScanError::ConfigMergeFailure(e.to_string()))?;
        let overrides: Value = serde_json::from_str(&raw)
            .map_err(|e| ScanError::ConfigMergeFailure(e.to_string()))?;

        let config = self.base.merge_overrides(&overrides)?;
        info!("Loaded overrides from {}", self.override_path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn partial_signal_weights_merge_into_base() {
        let base = ScannerConfig::default();
        let merged = base
            .merge_overrides(&json!({ "signal_weights": { "macd_cross": 2.0 } }))
            .unwrap();

        assert_eq!(merged.signal_weights.macd_cross, 2.0);
        assert_eq!(merged.signal_weights.ema_alignment, 0.8);
        assert_eq!(merged.signal_weights.ema_cross, 1.0);
        assert_eq!(merged.signal_weights.rsi_recovery, 1.0);
        assert_eq!(merged.signal_weights.volume_spike, 1.2);
        assert_eq!(merged.signal_weights.trend_bonus, 0.5);
    }

    #[test]
    fn tf_weights_merge_and_extend() {
        let merged = ScannerConfig::default()
            .merge_overrides(&json!({ "tf_weights": { "4h": 0.6, "1d": 0.1 } }))
            .unwrap();

        assert_eq!(merged.tf_weights["15m"], 0.2);
        assert_eq!(merged.tf_weights["1h"], 0.35);
        assert_eq!(merged.tf_weights["4h"], 0.6);
        assert_eq!(merged.tf_weights["1d"], 0.1);
    }

    #[test]
    fn top_level_values_replace() {
        let merged = ScannerConfig::default()
            .merge_overrides(&json!({ "min_score": 2.5, "excluded_coins": ["DOGE"] }))
            .unwrap();

        assert_eq!(merged.min_score, 2.5);
        assert_eq!(merged.excluded_coins, vec!["DOGE".to_string()]);
        assert_eq!(merged.top_coins_limit, 150);
    }

    #[test]
    fn wrong_types_are_a_merge_failure() {
        let err = ScannerConfig::default()
            .merge_overrides(&json!({ "min_score": "high" }))
            .unwrap_err();
        assert!(matches!(err, ScanError::ConfigMergeFailure(_)));

        let err = ScannerConfig::default()
            .merge_overrides(&json!([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, ScanError::ConfigMergeFailure(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ScannerConfig::default()
            .merge_overrides(&json!({ "max_workers": 0 }))
            .unwrap_err();
        assert!(matches!(err, ScanError::ConfigMergeFailure(_)));
    }

    #[test]
    fn non_positive_reward_ratios_are_rejected() {
        for patch in [
            json!({ "planner": { "reward_ratio1": -1.0 } }),
            json!({ "planner": { "reward_ratio2": 0.0 } }),
        ] {
            let err = ScannerConfig::default().merge_overrides(&patch).unwrap_err();
            assert!(matches!(err, ScanError::ConfigMergeFailure(_)));
        }
    }

    #[test]
    fn history_too_short_for_the_indicators_is_rejected() {
        let base = ScannerConfig::default();
        assert!(base.merge_overrides(&json!({ "ohlcv_limit": 40 })).is_err());
        assert!(
            base.merge_overrides(&json!({ "signal_params": { "volume_window": 300 } }))
                .is_err()
        );
        assert!(
            base.merge_overrides(&json!({ "signal_params": { "volume_window": 0 } }))
                .is_err()
        );

        let exact = base.merge_overrides(&json!({ "ohlcv_limit": 51 })).unwrap();
        assert_eq!(exact.ohlcv_limit, MIN_SERIES_LEN);
    }

    #[test]
    fn zero_timeout_and_wild_precision_are_rejected() {
        let base = ScannerConfig::default();
        assert!(base.merge_overrides(&json!({ "fetch_timeout_secs": 0 })).is_err());
        assert!(
            base.merge_overrides(&json!({ "planner": { "price_precision": 40 } }))
                .is_err()
        );
        assert!(
            base.merge_overrides(&json!({ "planner": { "entry_premium": -1.0 } }))
                .is_err()
        );
    }

    #[test]
    fn loader_falls_back_to_base_on_malformed_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let loader = ConfigLoader::new(ScannerConfig::default(), file.path());
        assert!(loader.try_load().is_err());
        assert_eq!(loader.load(), ScannerConfig::default());
    }

    #[test]
    fn loader_applies_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "planner": {{ "atr_multiplier": 2.5 }}, "top_coins_limit": 40 }}"#).unwrap();

        let config = ConfigLoader::new(ScannerConfig::default(), file.path()).load();
        assert_eq!(config.planner.atr_multiplier, 2.5);
        assert_eq!(config.planner.strong_trend_atr_multiplier, 3.0);
        assert_eq!(config.top_coins_limit, 40);
    }

    #[test]
    fn missing_document_is_base() {
        let loader = ConfigLoader::new(ScannerConfig::default(), "/nonexistent/dynamic_config.json");
        assert_eq!(loader.try_load().unwrap(), ScannerConfig::default());
    }

    #[test]
    fn default_weights_top_out_at_six() {
        let max = SignalWeights::default().max_score();
        assert!((max - 6.0).abs() < 1e-12);
    }
}
