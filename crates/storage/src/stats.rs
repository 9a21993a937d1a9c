use std::collections::BTreeMap;
use std::fmt::Write;

use common::models::{LoggedTrade, TradeOutcome};
use serde::Serialize;

/// Outcome counts and ratios of one group of logged trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub win_rate: Option<f64>,
    pub avg_rr: Option<f64>,
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    wins: usize,
    losses: usize,
    pending: usize,
    rr_sum: f64,
    rr_count: usize,
}

impl Accumulator {
    fn push(&mut self, trade: &LoggedTrade) {
        self.count += 1;
        match trade.outcome {
            TradeOutcome::Win => self.wins += 1,
            TradeOutcome::Loss => self.losses += 1,
            TradeOutcome::Pending => self.pending += 1,
        }
        if let Some(rr) = trade.rr_ratio.filter(|rr| rr.is_finite()) {
            self.rr_sum += rr;
            self.rr_count += 1;
        }
    }

    fn finish(&self) -> GroupStats {
        GroupStats {
            count: self.count,
            wins: self.wins,
            losses: self.losses,
            pending: self.pending,
            win_rate: (self.count > 0).then(|| round3(self.wins as f64 / self.count as f64)),
            avg_rr: (self.rr_count > 0).then(|| round3(self.rr_sum / self.rr_count as f64)),
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Aggregates recomputed from the trade log on every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStats {
    pub overall: GroupStats,
    pub by_signal_combo: BTreeMap<String, GroupStats>,
    pub by_market_regime: BTreeMap<String, GroupStats>,
}

impl TradeStats {
    pub fn from_trades(trades: &[LoggedTrade]) -> Self {
        let mut overall = Accumulator::default();
        let mut by_combo: BTreeMap<String, Accumulator> = BTreeMap::new();
        let mut by_regime: BTreeMap<String, Accumulator> = BTreeMap::new();

        for trade in trades {
            overall.push(trade);
            by_combo
                .entry(trade.signal_combo.clone())
                .or_default()
                .push(trade);
            by_regime
                .entry(trade.market_regime.to_string())
                .or_default()
                .push(trade);
        }

        Self {
            overall: overall.finish(),
            by_signal_combo: by_combo.iter().map(|(k, v)| (k.clone(), v.finish())).collect(),
            by_market_regime: by_regime.iter().map(|(k, v)| (k.clone(), v.finish())).collect(),
        }
    }

    /// Plain-text summary for chat delivery.
    pub fn report(&self) -> String {
        let mut out = String::from("Performance summary\n");
        let _ = writeln!(out, "overall: {}", describe(&self.overall));

        if !self.by_signal_combo.is_empty() {
            out.push_str("\nby signal combo\n");
            for (combo, stats) in &self.by_signal_combo {
                let _ = writeln!(out, "{}: {}", combo, describe(stats));
            }
        }
        if !self.by_market_regime.is_empty() {
            out.push_str("\nby market regime\n");
            for (regime, stats) in &self.by_market_regime {
                let _ = writeln!(out, "{}: {}", regime, describe(stats));
            }
        }
        out
    }
}

fn describe(stats: &GroupStats) -> String {
    let ratio = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v));
    format!(
        "{} trades, {}W/{}L/{}P, win rate {}, avg R:R {}",
        stats.count,
        stats.wins,
        stats.losses,
        stats.pending,
        ratio(stats.win_rate),
        ratio(stats.avg_rr)
    )
}
