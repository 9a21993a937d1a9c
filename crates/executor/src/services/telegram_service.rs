use std::env;

use async_trait::async_trait;
use common::errors::ScanError;
use teloxide::prelude::*;
use tracing::{error, info};

/// Telegram rejects messages above 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Outbound alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), ScanError>;

    /// Best effort: a failed delivery is logged and never reaches the caller.
    async fn send(&self, text: &str) {
        if let Err(e) = self.deliver(text).await {
            error!("Failed to send notification: {}", e);
        }
    }
}

pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    /// `None` unless both `TELEGRAM_BOT_TOKEN` and a numeric
    /// `TELEGRAM_CHAT_ID` are set.
    pub fn from_env() -> Option<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = telegram_chat_id()?;
        Some(Self::new(Bot::new(token), chat_id))
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

pub fn telegram_chat_id() -> Option<ChatId> {
    env::var("TELEGRAM_CHAT_ID")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .map(ChatId)
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<(), ScanError> {
        self.bot
            .send_message(self.chat_id, truncate(text, MAX_MESSAGE_CHARS))
            .await
            .map(|_| ())
            .map_err(|e| ScanError::NotificationFailure(e.to_string()))
    }
}

/// Fallback when no bot is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, text: &str) -> Result<(), ScanError> {
        info!("Notification:\n{}", text);
        Ok(())
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingNotifier;

    #[test]
    fn long_messages_are_cut() {
        assert_eq!(truncate("abcdef", 3), "abc…");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé…");
    }

    #[tokio::test]
    async fn send_swallows_delivery_failures() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        notifier.send("top signal").await;
        assert!(notifier.messages().is_empty());
        assert!(notifier.deliver("again").await.is_err());
    }
}
