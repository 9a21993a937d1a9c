use std::sync::Arc;
use std::time::{Duration, Instant};

use common::config::ScannerConfig;
use common::errors::ScanError;
use common::models::{InstrumentSeries, ScoredCandidate, TradePlan};
use futures_util::{StreamExt, stream};
use market_data::MarketDataSource;
use strategy::{SignalEvaluator, TradePlanner};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Timing context of one scan, passed through the orchestrator call.
#[derive(Debug, Clone, Copy)]
pub struct ScanTiming {
    pub cycle_id: Uuid,
    started: Instant,
}

impl ScanTiming {
    pub fn start() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub candidate: ScoredCandidate,
    pub plan: TradePlan,
    /// Close of the last analysed bar.
    pub last_price: f64,
    /// Position in the scanned universe; breaks score ties.
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub results: Vec<ScanResult>,
    pub scanned: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Fans the universe out over a bounded number of concurrent evaluations
/// and ranks what comes back.
pub struct ScanOrchestrator {
    config: Arc<ScannerConfig>,
    source: Arc<dyn MarketDataSource>,
    evaluator: SignalEvaluator,
    planner: TradePlanner,
}

impl ScanOrchestrator {
    pub fn new(config: Arc<ScannerConfig>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            evaluator: SignalEvaluator::new(&config),
            planner: TradePlanner::new(&config),
            config,
            source,
        }
    }

    pub async fn scan(
        &self,
        universe: &[String],
        timing: &ScanTiming,
        progress: &(dyn Fn(ScanProgress) + Send + Sync),
    ) -> ScanReport {
        let symbols: Vec<String> = universe
            .iter()
            .take(self.config.top_coins_limit)
            .cloned()
            .collect();
        let total = symbols.len();
        let mut results = Vec::new();
        let mut done = 0;
        let mut failed = 0;

        let mut pending = stream::iter(symbols.into_iter().enumerate())
            .map(|(index, symbol)| async move {
                let outcome = self.scan_symbol(index, &symbol).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.config.max_workers.max(1));

        while let Some((symbol, outcome)) = pending.next().await {
            done += 1;
            match outcome {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e @ ScanError::DataUnavailable { .. }) => {
                    failed += 1;
                    warn!("[{}] skipping {}: {}", timing.cycle_id, symbol, e);
                }
                Err(e) => debug!("[{}] no candidate for {}: {}", timing.cycle_id, symbol, e),
            }
            progress(ScanProgress { done, total });
        }

        rank(&mut results);
        ScanReport {
            results,
            scanned: total,
            failed,
            elapsed: timing.elapsed(),
        }
    }

    async fn scan_symbol(&self, index: usize, symbol: &str) -> Result<Option<ScanResult>, ScanError> {
        let series = self.fetch(symbol, &self.config.timeframe).await?;
        let Some(evaluation) = self.evaluator.evaluate(&series) else {
            return Ok(None);
        };
        let plan = self.planner.plan(&evaluation.snapshot)?;

        let mut candidate = evaluation.candidate;
        candidate.confluence = self.confluence(symbol, candidate.score).await;

        Ok(Some(ScanResult {
            candidate,
            plan,
            last_price: evaluation.snapshot.close,
            index,
        }))
    }

    async fn fetch(&self, symbol: &str, timeframe: &str) -> Result<InstrumentSeries, ScanError> {
        let limit = self.config.ohlcv_limit;
        match timeout(self.config.fetch_timeout(), self.source.fetch(symbol, timeframe, limit)).await {
            Ok(series) => series,
            Err(_) => Err(ScanError::unavailable(
                symbol,
                format!("{} fetch timed out after {:?}", timeframe, self.config.fetch_timeout()),
            )),
        }
    }

    /// Weighted mean of the primary score and the ungated scores on every
    /// other configured timeframe. Timeframes that fail drop out of the sum.
    async fn confluence(&self, symbol: &str, primary_score: f64) -> Option<f64> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for (timeframe, &weight) in &self.config.tf_weights {
            let score = if *timeframe == self.config.timeframe {
                primary_score
            } else {
                let assessed = match self.fetch(symbol, timeframe).await {
                    Ok(series) => self.evaluator.assess(&series),
                    Err(e) => Err(e),
                };
                match assessed {
                    Ok(evaluation) => evaluation.candidate.score,
                    Err(e) => {
                        debug!("{} {}: left out of confluence ({})", symbol, timeframe, e);
                        continue;
                    }
                }
            };
            weighted += weight * score;
            total_weight += weight;
        }

        (total_weight > 0.0).then(|| weighted / total_weight)
    }
}

/// Descending by score; equal scores keep universe order.
pub fn rank(results: &mut [ScanResult]) {
    results.sort_by(|a, b| {
        b.candidate
            .score
            .total_cmp(&a.candidate.score)
            .then(a.index.cmp(&b.index))
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::{MockSource, SlowSource, short_series, trending_series};
    use common::models::MarketRegime;

    fn result(symbol: &str, score: f64, index: usize) -> ScanResult {
        ScanResult {
            candidate: ScoredCandidate {
                symbol: symbol.to_string(),
                timeframe: "1h".to_string(),
                score,
                signals: vec![],
                regime: MarketRegime::Bull,
                trend_strength: 0.01,
                confluence: None,
            },
            plan: TradePlan {
                entry: 100.0,
                stop_loss: 90.0,
                take_profit1: 130.0,
                take_profit2: 150.0,
                risk_reward1: 3.0,
                risk_reward2: 5.0,
            },
            last_price: 100.0,
            index,
        }
    }

    fn universe(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn single_timeframe() -> ScannerConfig {
        let mut config = ScannerConfig::default();
        config.tf_weights.clear();
        config
    }

    #[test]
    fn ranking_is_stable_and_descending() {
        let mut results = vec![
            result("A", 3.0, 0),
            result("B", 5.0, 1),
            result("C", 5.0, 2),
            result("D", 1.0, 3),
        ];
        // arrival order from the worker pool is arbitrary
        results.reverse();
        rank(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.candidate.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A", "D"]);
    }

    #[tokio::test]
    async fn failing_instruments_are_isolated() {
        let mut source = MockSource::new();
        source.expect_fetch().returning(|symbol, timeframe, _| match symbol {
            "BADUSDT" => Err(ScanError::unavailable(symbol, "HTTP 400")),
            "NEWUSDT" => Ok(short_series(symbol, timeframe)),
            _ => Ok(trending_series(symbol, timeframe, symbol == "SOLUSDT")),
        });

        let orchestrator = ScanOrchestrator::new(Arc::new(single_timeframe()), Arc::new(source));
        let calls = AtomicUsize::new(0);
        let report = orchestrator
            .scan(
                &universe(&["ADAUSDT", "BADUSDT", "NEWUSDT", "SOLUSDT"]),
                &ScanTiming::start(),
                &|_: ScanProgress| {
                    calls.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(report.scanned, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let order: Vec<&str> = report.results.iter().map(|r| r.candidate.symbol.as_str()).collect();
        // the volume spike puts SOL ahead of ADA
        assert_eq!(order, vec!["SOLUSDT", "ADAUSDT"]);
        assert!(report.results[0].candidate.score > report.results[1].candidate.score);
        assert_eq!(report.results[1].index, 0);
        assert!(report.results.iter().all(|r| r.candidate.confluence.is_none()));
    }

    #[tokio::test]
    async fn universe_is_capped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut source = MockSource::new();
        source.expect_fetch().returning(move |symbol, timeframe, limit| {
            assert_eq!(limit, 200);
            if let Ok(mut seen) = recorder.lock() {
                seen.push(symbol.to_string());
            }
            Ok(trending_series(symbol, timeframe, false))
        });

        let mut config = single_timeframe();
        config.top_coins_limit = 2;
        let orchestrator = ScanOrchestrator::new(Arc::new(config), Arc::new(source));
        let report = orchestrator
            .scan(&universe(&["AUSDT", "BUSDT", "CUSDT"]), &ScanTiming::start(), &|_: ScanProgress| {})
            .await;

        assert_eq!(report.scanned, 2);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["AUSDT", "BUSDT"]);
    }

    #[tokio::test]
    async fn scan_runs_on_a_spawned_task() {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .returning(|symbol, timeframe, _| Ok(trending_series(symbol, timeframe, false)));
        let orchestrator = ScanOrchestrator::new(Arc::new(single_timeframe()), Arc::new(source));

        let report = tokio::spawn(async move {
            orchestrator
                .scan(&universe(&["SOLUSDT"]), &ScanTiming::start(), &|_: ScanProgress| {})
                .await
        })
        .await
        .unwrap();
        assert_eq!(report.results.len(), 1);
    }

    #[tokio::test]
    async fn slow_fetch_times_out_without_blocking_others() {
        let mut config = single_timeframe();
        config.fetch_timeout_secs = 1;
        let source = SlowSource {
            slow_symbol: "SLOWUSDT".to_string(),
            delay: Duration::from_secs(30),
        };

        let orchestrator = ScanOrchestrator::new(Arc::new(config), Arc::new(source));
        let report = orchestrator
            .scan(&universe(&["SLOWUSDT", "FASTUSDT"]), &ScanTiming::start(), &|_: ScanProgress| {})
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].candidate.symbol, "FASTUSDT");
        assert!(report.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn confluence_weights_the_other_timeframes() {
        let mut source = MockSource::new();
        source.expect_fetch().returning(|symbol, timeframe, _| match timeframe {
            "15m" => Ok(short_series(symbol, timeframe)),
            "4h" => {
                let mut series = trending_series(symbol, timeframe, false);
                series.bars.reverse();
                Ok(series)
            }
            _ => Ok(trending_series(symbol, timeframe, true)),
        });

        let config = ScannerConfig::default();
        let evaluator = SignalEvaluator::new(&config);
        let primary = evaluator
            .assess(&trending_series("SOLUSDT", "1h", true))
            .unwrap()
            .candidate
            .score;
        let mut reversed = trending_series("SOLUSDT", "4h", false);
        reversed.bars.reverse();
        let secondary = evaluator.assess(&reversed).unwrap().candidate.score;

        let orchestrator = ScanOrchestrator::new(Arc::new(config), Arc::new(source));
        let report = orchestrator
            .scan(&universe(&["SOLUSDT"]), &ScanTiming::start(), &|_: ScanProgress| {})
            .await;

        let confluence = report.results[0].candidate.confluence.unwrap();
        let expected = (0.35 * primary + 0.45 * secondary) / 0.8;
        assert!((confluence - expected).abs() < 1e-9);
        assert_eq!(report.results[0].candidate.score, primary);
    }
}
