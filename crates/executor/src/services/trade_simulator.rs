use std::sync::Arc;

use chrono::Utc;
use common::config::ScannerConfig;
use common::models::{LoggedTrade, TradeOutcome, TradePlan};
use market_data::MarketDataSource;
use storage::{TradeLog, TradeLogError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::scan_orchestrator::ScanResult;

/// Win at or above the first take-profit, loss at or below the stop,
/// pending in between.
pub fn assign_outcome(latest_price: f64, plan: &TradePlan) -> TradeOutcome {
    if latest_price >= plan.take_profit1 {
        TradeOutcome::Win
    } else if latest_price <= plan.stop_loss {
        TradeOutcome::Loss
    } else {
        TradeOutcome::Pending
    }
}

/// `(tp - entry) / (entry - sl)` to three places; `None` for a zero-width stop.
pub fn realized_rr(entry: f64, take_profit: f64, stop_loss: f64) -> Option<f64> {
    let risk = entry - stop_loss;
    if risk == 0.0 || !risk.is_finite() {
        return None;
    }
    let rr = (take_profit - entry) / risk;
    rr.is_finite().then(|| (rr * 1000.0).round() / 1000.0)
}

/// Resolves the top-ranked plans against the latest price and appends them
/// to the trade log. Rows are never revisited.
pub struct TradeSimulator {
    config: Arc<ScannerConfig>,
    source: Arc<dyn MarketDataSource>,
    log: TradeLog,
}

impl TradeSimulator {
    pub fn new(config: Arc<ScannerConfig>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            log: TradeLog::new(&config.trade_log_path),
            config,
            source,
        }
    }

    pub fn log(&self) -> &TradeLog {
        &self.log
    }

    async fn latest_price(&self, result: &ScanResult) -> f64 {
        let symbol = &result.candidate.symbol;
        match timeout(self.config.fetch_timeout(), self.source.latest_price(symbol)).await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                warn!("Latest price for {} unavailable, using last close: {}", symbol, e);
                result.last_price
            }
            Err(_) => {
                warn!("Latest price for {} timed out, using last close", symbol);
                result.last_price
            }
        }
    }

    pub async fn simulate(&self, ranked: &[ScanResult]) -> Vec<LoggedTrade> {
        let mut trades = Vec::new();
        for result in ranked.iter().take(self.config.top_k_logged) {
            let latest = self.latest_price(result).await;
            let plan = &result.plan;
            let outcome = assign_outcome(latest, plan);
            debug!(
                "{}: latest {} against TP1 {} / SL {} -> {}",
                result.candidate.symbol, latest, plan.take_profit1, plan.stop_loss, outcome
            );

            trades.push(LoggedTrade {
                timestamp: Utc::now(),
                symbol: result.candidate.symbol.clone(),
                entry_price: plan.entry,
                tp_price: plan.take_profit1,
                sl_price: plan.stop_loss,
                outcome,
                signal_combo: result.candidate.signal_combo(),
                rr_ratio: realized_rr(plan.entry, plan.take_profit1, plan.stop_loss),
                market_regime: result.candidate.regime,
                trend_strength: result.candidate.trend_strength,
            });
        }
        trades
    }

    pub async fn simulate_and_log(&self, ranked: &[ScanResult]) -> Result<Vec<LoggedTrade>, TradeLogError> {
        let trades = self.simulate(ranked).await;
        if !trades.is_empty() {
            let written = self.log.append(&trades)?;
            info!("Logged {} simulated trades to {}", written, self.log.path().display());
        }
        Ok(trades)
    }
}
