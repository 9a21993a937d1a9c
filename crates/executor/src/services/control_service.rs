use std::fs;
use std::sync::Arc;

use anyhow::Context;
use common::config::ConfigLoader;
use serde_json::Value;
use storage::{TradeLog, TradeStats};
use tracing::info;

use super::advisor::ParameterAdvisor;

/// Operations behind the chat commands and the CLI subcommands.
pub struct ControlService {
    loader: ConfigLoader,
    advisor: Arc<dyn ParameterAdvisor>,
}

impl ControlService {
    pub fn new(loader: ConfigLoader, advisor: Arc<dyn ParameterAdvisor>) -> Self {
        Self { loader, advisor }
    }

    pub fn health(&self) -> &'static str {
        "ok"
    }

    /// Statistics recomputed from the whole trade log.
    pub fn analyze(&self) -> anyhow::Result<TradeStats> {
        let config = self.loader.load();
        let log = TradeLog::new(&config.trade_log_path);
        let trades = log
            .read_all()
            .with_context(|| format!("reading {}", log.path().display()))?;
        Ok(TradeStats::from_trades(&trades))
    }

    /// Asks the advisor for overrides and stores them as the new override
    /// document once they merge into a valid configuration.
    pub async fn optimize(&self) -> anyhow::Result<Value> {
        let config = self.loader.load();
        let stats = self.analyze()?;
        let suggestion = self.advisor.suggest(&stats, &config).await?;

        self.loader
            .base()
            .merge_overrides(&suggestion)
            .context("advisor suggestion rejected")?;

        let path = self.loader.override_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&suggestion)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Stored advisor overrides in {}", path.display());
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::advisor::MockParameterAdvisor;
    use common::config::ScannerConfig;
    use common::models::{LoggedTrade, MarketRegime, TradeOutcome};
    use chrono::Utc;
    use serde_json::json;

    fn loader(dir: &tempfile::TempDir) -> ConfigLoader {
        let mut base = ScannerConfig::default();
        base.trade_log_path = dir.path().join("trades.csv");
        ConfigLoader::new(base, dir.path().join("dynamic_config.json"))
    }

    fn trade(outcome: TradeOutcome) -> LoggedTrade {
        LoggedTrade {
            timestamp: Utc::now(),
            symbol: "SOLUSDT".to_string(),
            entry_price: 100.0,
            tp_price: 130.0,
            sl_price: 90.0,
            outcome,
            signal_combo: "ema_alignment".to_string(),
            rr_ratio: Some(3.0),
            market_regime: MarketRegime::Bull,
            trend_strength: 0.01,
        }
    }

    #[test]
    fn analyze_reads_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(&dir);
        TradeLog::new(&loader.base().trade_log_path)
            .append(&[trade(TradeOutcome::Win), trade(TradeOutcome::Loss)])
            .unwrap();

        let control = ControlService::new(loader, Arc::new(MockParameterAdvisor::new()));
        let stats = control.analyze().unwrap();
        assert_eq!(stats.overall.count, 2);
        assert_eq!(stats.overall.win_rate, Some(0.5));
        assert_eq!(control.health(), "ok");
    }

    #[tokio::test]
    async fn optimize_stores_a_valid_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(&dir);
        let mut advisor = MockParameterAdvisor::new();
        advisor
            .expect_suggest()
            .times(1)
            .returning(|_, _| Ok(json!({ "min_score": 2.0, "signal_weights": { "macd_cross": 2.0 } })));

        let control = ControlService::new(loader.clone(), Arc::new(advisor));
        control.optimize().await.unwrap();

        let config = loader.try_load().unwrap();
        assert_eq!(config.min_score, 2.0);
        assert_eq!(config.signal_weights.macd_cross, 2.0);
        assert_eq!(config.signal_weights.ema_cross, 1.0);
    }

    #[tokio::test]
    async fn optimize_rejects_an_invalid_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(&dir);
        let mut advisor = MockParameterAdvisor::new();
        advisor
            .expect_suggest()
            .returning(|_, _| Ok(json!({ "max_workers": 0 })));

        let control = ControlService::new(loader.clone(), Arc::new(advisor));
        assert!(control.optimize().await.is_err());
        assert!(!loader.override_path().exists());
    }
}
