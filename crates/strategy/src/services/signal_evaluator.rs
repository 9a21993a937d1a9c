use common::config::{ScannerConfig, SignalParams, SignalWeights};
use common::errors::ScanError;
use common::models::{IndicatorSnapshot, InstrumentSeries, MarketRegime, ScoredCandidate, SignalKind};
use tracing::debug;

use crate::indicators::IndicatorSet;

/// Fired signals and the composite score of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScore {
    pub score: f64,
    pub signals: Vec<SignalKind>,
    pub trend_bonus: bool,
}

/// A scored candidate together with the snapshot it was scored on.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub candidate: ScoredCandidate,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    weights: SignalWeights,
    params: SignalParams,
    min_score: f64,
    indicators: IndicatorSet,
}

impl SignalEvaluator {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            weights: config.signal_weights.clone(),
            params: config.signal_params.clone(),
            min_score: config.min_score,
            indicators: IndicatorSet::new(config.signal_params.volume_window),
        }
    }

    fn fires(&self, kind: SignalKind, s: &IndicatorSnapshot) -> bool {
        match kind {
            SignalKind::EmaAlignment => s.ema9 > s.ema21 && s.ema21 > s.ema50,
            SignalKind::EmaCross => s.ema9_prev <= s.ema21_prev && s.ema9 > s.ema21,
            SignalKind::MacdCross => s.macd_diff_prev < 0.0 && s.macd_diff_now > 0.0,
            SignalKind::RsiRecovery => {
                let level = self.params.rsi_recovery_level;
                s.rsi_prev < level && s.rsi_now > level
            }
            SignalKind::VolumeSpike => {
                s.volume_now > self.params.volume_spike_factor * s.volume_avg20
            }
        }
    }

    /// Scores a snapshot. Every condition is checked independently and adds
    /// its weight at most once.
    pub fn score(&self, snapshot: &IndicatorSnapshot) -> SignalScore {
        let mut score = 0.0;
        let mut signals = Vec::new();

        for kind in SignalKind::ALL {
            if self.fires(kind, snapshot) {
                score += self.weights.weight(kind);
                signals.push(kind);
            }
        }

        let trend_bonus = snapshot.adx > self.params.trend_adx && snapshot.ema9 > snapshot.ema21;
        if trend_bonus {
            score += self.weights.trend_bonus;
        }

        SignalScore {
            score,
            signals,
            trend_bonus,
        }
    }

    /// Scores a series without applying the candidate gate.
    pub fn assess(&self, series: &InstrumentSeries) -> Result<Evaluation, ScanError> {
        let snapshot = self.indicators.compute(&series.bars)?;
        let SignalScore { score, signals, .. } = self.score(&snapshot);

        let candidate = ScoredCandidate {
            symbol: series.symbol.clone(),
            timeframe: series.timeframe.clone(),
            score,
            signals,
            regime: MarketRegime::from_mean_return(snapshot.mean_return_long),
            trend_strength: snapshot.mean_return_short.abs(),
            confluence: None,
        };
        Ok(Evaluation {
            candidate,
            snapshot,
        })
    }

    /// Returns a candidate only when the series is usable and its score
    /// reaches the configured minimum.
    pub fn evaluate(&self, series: &InstrumentSeries) -> Option<Evaluation> {
        let evaluation = match self.assess(series) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                debug!("{} {}: no candidate ({})", series.symbol, series.timeframe, e);
                return None;
            }
        };

        if evaluation.candidate.score < self.min_score {
            debug!(
                "{} {}: score {:.2} below gate {:.2}",
                series.symbol, series.timeframe, evaluation.candidate.score, self.min_score
            );
            return None;
        }
        Some(evaluation)
    }
}
