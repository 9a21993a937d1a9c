use std::fmt::Write;
use std::sync::Arc;

use anyhow::Context;
use common::config::{ConfigLoader, ScannerConfig};
use common::errors::ScanError;
use common::models::LoggedTrade;
use market_data::MarketDataSource;
use tracing::{Instrument, debug, info, info_span};

use super::scan_orchestrator::{ScanOrchestrator, ScanProgress, ScanReport, ScanResult, ScanTiming};
use super::telegram_service::Notifier;
use super::trade_simulator::TradeSimulator;

/// Builds the market data source for the configuration of one cycle.
pub type SourceFactory =
    Arc<dyn Fn(&ScannerConfig) -> Result<Arc<dyn MarketDataSource>, ScanError> + Send + Sync>;

#[derive(Debug)]
pub struct CycleSummary {
    pub report: ScanReport,
    pub logged: Vec<LoggedTrade>,
    pub alerted: bool,
}

/// One complete scan: load config, list the universe, orchestrate, log the
/// top trades and alert on the best candidate.
pub struct ScanCycle {
    loader: ConfigLoader,
    sources: SourceFactory,
    notifier: Arc<dyn Notifier>,
}

impl ScanCycle {
    pub fn new(loader: ConfigLoader, sources: SourceFactory, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            loader,
            sources,
            notifier,
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub async fn run(&self) -> anyhow::Result<CycleSummary> {
        let timing = ScanTiming::start();
        let span = info_span!("scan", cycle = %timing.cycle_id);
        self.run_with(timing).instrument(span).await
    }

    async fn run_with(&self, timing: ScanTiming) -> anyhow::Result<CycleSummary> {
        let config = Arc::new(self.loader.load());
        let source = (self.sources)(config.as_ref())?;

        let universe = source
            .list_universe()
            .await
            .context("listing the instrument universe")?;
        info!(
            "Scanning {} instruments on {} ({})",
            universe.len().min(config.top_coins_limit),
            config.exchange,
            config.timeframe
        );

        let orchestrator = ScanOrchestrator::new(config.clone(), source.clone());
        let report = orchestrator
            .scan(&universe, &timing, &|p: ScanProgress| {
                debug!("progress {}/{}", p.done, p.total);
            })
            .await;

        let simulator = TradeSimulator::new(config.clone(), source);
        let logged = simulator.simulate_and_log(&report.results).await?;

        let mut alerted = false;
        if let Some(top) = report.results.first() {
            if top.candidate.score >= config.alert_min_score {
                self.notifier.send(&format_alert(top)).await;
                alerted = true;
            } else {
                debug!(
                    "Top score {:.2} below alert gate {:.2}",
                    top.candidate.score, config.alert_min_score
                );
            }
        }

        info!(
            "Scan finished in {:.1}s: {} scanned, {} candidates, {} failed, {} logged",
            timing.elapsed().as_secs_f64(),
            report.scanned,
            report.results.len(),
            report.failed,
            logged.len()
        );
        Ok(CycleSummary {
            report,
            logged,
            alerted,
        })
    }
}

pub fn format_alert(result: &ScanResult) -> String {
    let c = &result.candidate;
    let p = &result.plan;
    let mut text = format!("🚀 Top signal: {} ({})\n", c.symbol, c.timeframe);
    let _ = writeln!(text, "Score: {:.2}", c.score);
    if let Some(confluence) = c.confluence {
        let _ = writeln!(text, "Confluence: {:.2}", confluence);
    }
    let _ = writeln!(text, "Entry: {}", p.entry);
    let _ = writeln!(text, "TP1: {} ({}R)", p.take_profit1, p.risk_reward1);
    let _ = writeln!(text, "TP2: {} ({}R)", p.take_profit2, p.risk_reward2);
    let _ = writeln!(text, "SL: {}", p.stop_loss);
    let _ = writeln!(text, "Regime: {} (trend {:.4})", c.regime, c.trend_strength);
    let signals: Vec<&str> = c.signals.iter().map(|s| s.label()).collect();
    let _ = write!(
        text,
        "Signals: {}",
        if signals.is_empty() { "none".to_string() } else { signals.join(", ") }
    );
    text
}
