use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::actors::{Actor, ActorType, ControlMessage, HeartbeatGuard};
use crate::services::scan_cycle::ScanCycle;

/// Drives scan cycles back to back, sleeping the configured interval in
/// between. A cycle always completes before the next one starts.
pub struct ScannerActor {
    cycle: Arc<ScanCycle>,
}

impl ScannerActor {
    pub fn new(cycle: Arc<ScanCycle>) -> Self {
        Self { cycle }
    }
}

/// Runs one cycle and contains its failure. A failure is logged, reported
/// to the notifier and handed back.
pub async fn run_cycle(cycle: &ScanCycle) -> Option<String> {
    let reason = format!("{:#}", cycle.run().await.err()?);
    error!("Scan cycle failed: {}", reason);
    cycle
        .notifier()
        .send(&format!("⚠️ Scan loop error: {}", reason))
        .await;
    Some(reason)
}

#[async_trait]
impl Actor for ScannerActor {
    fn name(&self) -> ActorType {
        ActorType::ScannerActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = HeartbeatGuard(self.spawn_heartbeat(supervisor_tx.clone()));
        info!("Scanner loop started");

        loop {
            if let Some(reason) = run_cycle(&self.cycle).await {
                let _ = supervisor_tx
                    .send(ControlMessage::Error(self.name(), reason))
                    .await;
            }
            let interval = self.cycle.loader().load().scan_interval();
            debug!("Next scan in {:?}", interval);
            sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scan_cycle::SourceFactory;
    use crate::test_utils::{MockSource, RecordingNotifier};
    use common::config::{ConfigLoader, ScannerConfig};
    use common::errors::ScanError;
    use market_data::MarketDataSource;

    #[tokio::test]
    async fn failed_cycle_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockSource::new();
        source
            .expect_list_universe()
            .returning(|| Err(ScanError::unavailable("universe", "HTTP 503")));
        let source: Arc<dyn MarketDataSource> = Arc::new(source);
        let factory: SourceFactory = Arc::new(move |_: &ScannerConfig| Ok::<_, ScanError>(source.clone()));

        let notifier = Arc::new(RecordingNotifier::default());
        let loader = ConfigLoader::new(ScannerConfig::default(), dir.path().join("dynamic_config.json"));
        let cycle = ScanCycle::new(loader, factory, notifier.clone());

        let reason = run_cycle(&cycle).await.unwrap();
        assert!(reason.contains("HTTP 503"));
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("⚠️ Scan loop error"));
    }

    #[tokio::test]
    async fn actor_loop_runs_on_a_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = MockSource::new();
        source
            .expect_list_universe()
            .returning(|| Err(ScanError::unavailable("universe", "HTTP 503")));
        let source: Arc<dyn MarketDataSource> = Arc::new(source);
        let factory: SourceFactory = Arc::new(move |_: &ScannerConfig| Ok::<_, ScanError>(source.clone()));
        let loader = ConfigLoader::new(ScannerConfig::default(), dir.path().join("dynamic_config.json"));
        let cycle = Arc::new(ScanCycle::new(loader, factory, Arc::new(RecordingNotifier::default())));

        let (tx, mut rx) = mpsc::channel(16);
        let mut actor = ScannerActor::new(cycle);
        let handle = tokio::spawn(async move { actor.run(tx).await });

        let mut saw_error = false;
        while let Some(msg) = rx.recv().await {
            if let ControlMessage::Error(ActorType::ScannerActor, reason) = msg {
                assert!(reason.contains("HTTP 503"));
                saw_error = true;
                break;
            }
        }
        handle.abort();
        assert!(saw_error);
    }
}
