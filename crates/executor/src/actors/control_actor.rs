use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::actors::{Actor, ActorType, ControlMessage, HeartbeatGuard};
use crate::services::control_service::ControlService;
use crate::services::telegram_service::truncate;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Scanner commands:")]
pub enum Command {
    #[command(description = "check that the scanner is alive.")]
    Health,
    #[command(description = "performance of the logged trades.")]
    Analyze,
    #[command(description = "ask the advisor for new parameters and store them.")]
    Optimize,
    #[command(description = "show this text.")]
    Help,
}

/// Telegram command surface, answering only the configured chat.
pub struct ControlActor {
    bot: Bot,
    chat_id: ChatId,
    control: Arc<ControlService>,
}

impl ControlActor {
    pub fn new(bot: Bot, chat_id: ChatId, control: Arc<ControlService>) -> Self {
        Self {
            bot,
            chat_id,
            control,
        }
    }
}

pub async fn reply_for(control: &ControlService, cmd: Command) -> String {
    match cmd {
        Command::Health => control.health().to_string(),
        Command::Analyze => match control.analyze() {
            Ok(stats) => stats.report(),
            Err(e) => format!("Analyze failed: {:#}", e),
        },
        Command::Optimize => match control.optimize().await {
            Ok(suggestion) => format!(
                "Stored new parameters:\n{}",
                serde_json::to_string_pretty(&suggestion).unwrap_or_else(|_| suggestion.to_string())
            ),
            Err(e) => format!("Optimize failed: {:#}", e),
        },
        Command::Help => Command::descriptions().to_string(),
    }
}

async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    control: Arc<ControlService>,
    chat_id: ChatId,
) -> ResponseResult<()> {
    if msg.chat.id != chat_id {
        warn!("Ignoring {:?} from unknown chat {}", cmd, msg.chat.id.0);
        return Ok(());
    }
    info!("Control command {:?}", cmd);
    let reply = reply_for(&control, cmd).await;
    bot.send_message(msg.chat.id, truncate(&reply, 4000)).await?;
    Ok(())
}

#[async_trait]
impl Actor for ControlActor {
    fn name(&self) -> ActorType {
        ActorType::ControlActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let _heartbeat = HeartbeatGuard(self.spawn_heartbeat(supervisor_tx));
        info!("Control bot listening for chat {}", self.chat_id.0);

        let handler = Update::filter_message()
            .filter_command::<Command>()
            .endpoint(answer);

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.control.clone(), self.chat_id])
            .build()
            .dispatch()
            .await;

        anyhow::bail!("control dispatcher stopped")
    }
}
