use std::{env, sync::Arc};

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{debug, info, warn};

use common::actors::{Actor, ActorType};
use common::config::{ConfigLoader, ScannerConfig};
use common::errors::ScanError;
use common::logger;
use market_data::{ExchangeClient, MarketDataSource};

use crate::actors::control_actor::ControlActor;
use crate::actors::scanner_actor::{self, ScannerActor};
use crate::actors::supervisor::Supervisor;
use crate::services::advisor::{HttpAdvisor, NoAdvisor, ParameterAdvisor};
use crate::services::control_service::ControlService;
use crate::services::scan_cycle::{ScanCycle, SourceFactory};
use crate::services::telegram_service::{LogNotifier, Notifier, TelegramNotifier};

mod actors;
mod services;
#[cfg(test)]
mod test_utils;

#[derive(Parser)]
#[command(name = "scanner", version, about = "Altcoin signal scanner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan on an interval with the chat control surface, under supervision (default)
    Run,
    /// Scan in the foreground without supervision
    Scan {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Print statistics of the trade log
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Ask the parameter advisor for new overrides and store them
    Optimize,
}

/// Exchange client per cycle, so overrides of the exchange or timeouts apply
/// on the next scan. `EXCHANGE_BASE_URL` points the client at a mirror.
fn exchange_sources() -> SourceFactory {
    let base_url = env::var("EXCHANGE_BASE_URL").ok();
    Arc::new(move |config: &ScannerConfig| {
        let mut client = ExchangeClient::new(config)?;
        if let Some(url) = &base_url {
            client = client.with_base_url(url.clone());
        }
        let source: Arc<dyn MarketDataSource> = Arc::new(client);
        Ok::<_, ScanError>(source)
    })
}

async fn run_supervised(
    cycle: Arc<ScanCycle>,
    control: Arc<ControlService>,
    telegram: Option<TelegramNotifier>,
) {
    let mut supervisor = Supervisor::new();

    supervisor.register_actor(
        ActorType::ScannerActor,
        Box::new(move || -> Box<dyn Actor> { Box::new(ScannerActor::new(cycle.clone())) }),
    );

    match telegram {
        Some(telegram) => {
            let bot = telegram.bot().clone();
            let chat_id = telegram.chat_id();
            supervisor.register_actor(
                ActorType::ControlActor,
                Box::new(move || -> Box<dyn Actor> {
                    Box::new(ControlActor::new(bot.clone(), chat_id, control.clone()))
                }),
            );
        }
        None => warn!("Telegram not configured, control commands only via the CLI"),
    }

    supervisor.start().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    let cli = Cli::parse();
    debug!("System starting up...");

    let loader = ConfigLoader::from_env();

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_env() {
        Some(telegram) => Arc::new(telegram),
        None => {
            warn!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set, alerts go to the log");
            Arc::new(LogNotifier)
        }
    };
    let advisor: Arc<dyn ParameterAdvisor> = match HttpAdvisor::from_env() {
        Some(advisor) => Arc::new(advisor?),
        None => Arc::new(NoAdvisor),
    };

    let control = Arc::new(ControlService::new(loader.clone(), advisor));
    let cycle = Arc::new(ScanCycle::new(loader, exchange_sources(), notifier));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_supervised(cycle, control, TelegramNotifier::from_env()).await,
        Commands::Scan { once: true } => {
            let summary = cycle.run().await?;
            for result in &summary.report.results {
                println!(
                    "{:<14} score {:>5.2}  entry {}  sl {}  tp1 {}  [{}]",
                    result.candidate.symbol,
                    result.candidate.score,
                    result.plan.entry,
                    result.plan.stop_loss,
                    result.plan.take_profit1,
                    result.candidate.signal_combo()
                );
            }
        }
        Commands::Scan { once: false } => loop {
            scanner_actor::run_cycle(&cycle).await;
            let interval = cycle.loader().load().scan_interval();
            info!("Next scan in {:?}", interval);
            tokio::time::sleep(interval).await;
        },
        Commands::Analyze { json } => {
            let stats = control.analyze()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", stats.report());
            }
        }
        Commands::Optimize => {
            let suggestion = control.optimize().await?;
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
        }
    }
    Ok(())
}
