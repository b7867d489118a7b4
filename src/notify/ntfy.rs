// src/notify/ntfy.rs
//! Push notifications via an ntfy server. Routing: the event's topic hint
//! wins, then the channel's default topic; with neither the event is
//! skipped with a warning rather than treated as a failure.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{Channel, NotificationEvent};
use crate::config::NtfyConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NtfyChannel {
    server: String,
    default_topic: Option<String>,
    client: Client,
}

impl NtfyChannel {
    pub fn from_config(cfg: &NtfyConfig) -> Self {
        Self {
            server: cfg.server.trim_end_matches('/').to_string(),
            default_topic: cfg.default_topic.clone(),
            client: Client::new(),
        }
    }
}

pub(crate) fn resolve_topic<'a>(
    event_topic: Option<&'a str>,
    default_topic: Option<&'a str>,
) -> Option<&'a str> {
    event_topic.or(default_topic)
}

#[async_trait]
impl Channel for NtfyChannel {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let Some(topic) = resolve_topic(ev.topic.as_deref(), self.default_topic.as_deref()) else {
            tracing::warn!("no ntfy topic configured, skipping push");
            return Ok(());
        };

        let mut req = self
            .client
            .post(format!("{}/{topic}", self.server))
            .timeout(SEND_TIMEOUT)
            .header("Title", ev.title.clone())
            .header("Priority", "high")
            .header("Tags", "bell")
            .body(ev.body.clone());

        if let Some(link) = &ev.link {
            req = req
                .header("Click", link.clone())
                .header("Actions", format!("view, Open, {link}"));
        }

        req.send()
            .await
            .context("ntfy post")?
            .error_for_status()
            .context("ntfy non-2xx")?;

        tracing::debug!(topic, "push notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_topic_wins_over_default() {
        assert_eq!(resolve_topic(Some("mine"), Some("default")), Some("mine"));
        assert_eq!(resolve_topic(None, Some("default")), Some("default"));
        assert_eq!(resolve_topic(None, None), None);
    }

    #[tokio::test]
    async fn missing_topic_is_skipped_not_failed() {
        let ch = NtfyChannel {
            server: "https://ntfy.invalid".into(),
            default_topic: None,
            client: Client::new(),
        };
        // No topic anywhere: must return Ok without attempting the POST.
        let res = ch.send(&NotificationEvent::new("t", "b")).await;
        assert!(res.is_ok());
    }
}
