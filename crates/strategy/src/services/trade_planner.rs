use common::config::{PlannerParams, ScannerConfig};
use common::errors::ScanError;
use common::models::{IndicatorSnapshot, TradePlan};

/// Turns a gated snapshot into entry, stop and take-profit levels.
#[derive(Debug, Clone)]
pub struct TradePlanner {
    params: PlannerParams,
}

impl TradePlanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            params: config.planner.clone(),
        }
    }

    pub fn volatility_multiplier(&self, adx: f64) -> f64 {
        if adx > self.params.strong_trend_adx {
            self.params.strong_trend_atr_multiplier
        } else {
            self.params.atr_multiplier
        }
    }

    pub fn plan(&self, snapshot: &IndicatorSnapshot) -> Result<TradePlan, ScanError> {
        let p = &self.params;

        if !snapshot.atr.is_finite() || snapshot.atr <= 0.0 {
            return Err(ScanError::DegenerateTrade(format!("ATR is {}", snapshot.atr)));
        }

        let entry = (snapshot.ema21 * (1.0 + p.entry_premium)).max(snapshot.close);
        let stop_loss = entry - snapshot.atr * self.volatility_multiplier(snapshot.adx);
        let risk = entry - stop_loss;
        let take_profit1 = entry + risk * p.reward_ratio1;
        let take_profit2 = entry + risk * p.reward_ratio2;

        let plan = TradePlan {
            entry: round_to(entry, p.price_precision),
            stop_loss: round_to(stop_loss, p.price_precision),
            take_profit1: round_to(take_profit1, p.price_precision),
            take_profit2: round_to(take_profit2, p.price_precision),
            risk_reward1: p.reward_ratio1,
            risk_reward2: p.reward_ratio2,
        };

        if !(plan.entry.is_finite() && plan.stop_loss.is_finite()) {
            return Err(ScanError::DegenerateTrade("non-finite price levels".to_string()));
        }
        if plan.stop_loss >= plan.entry {
            return Err(ScanError::DegenerateTrade(format!(
                "stop distance vanishes at {} decimals",
                p.price_precision
            )));
        }
        if !(plan.take_profit1 > plan.entry && plan.take_profit2 > plan.entry) {
            return Err(ScanError::DegenerateTrade(format!(
                "take-profit {} not above entry {}",
                plan.take_profit1, plan.entry
            )));
        }
        if plan.stop_loss <= 0.0 {
            return Err(ScanError::DegenerateTrade(format!(
                "stop {} at or below zero",
                plan.stop_loss
            )));
        }
        Ok(plan)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
