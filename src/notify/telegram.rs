// src/notify/telegram.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{Channel, NotificationEvent};
use crate::config::TelegramConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramChannel {
    bot_token: String,
    chat_ids: Vec<String>,
    client: Client,
}

impl TelegramChannel {
    pub fn from_config(cfg: &TelegramConfig) -> Self {
        Self {
            bot_token: cfg.bot_token.clone(),
            chat_ids: cfg.chat_ids.clone(),
            client: Client::new(),
        }
    }

    fn message_text(ev: &NotificationEvent) -> String {
        let mut text = format!("*{}*\n{}", ev.title, ev.body);
        if let Some(link) = &ev.link {
            text.push_str(&format!("\n\n[Open link]({link})"));
        }
        text
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = Self::message_text(ev);

        for chat_id in &self.chat_ids {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": false,
            });

            self.client
                .post(&url)
                .timeout(SEND_TIMEOUT)
                .json(&body)
                .send()
                .await
                .context("telegram post")?
                .error_for_status()
                .context("telegram non-2xx")?;
        }
        Ok(())
    }
}
