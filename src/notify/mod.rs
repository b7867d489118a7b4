// src/notify/mod.rs
//! Multi-channel notification fan-out. Every enabled channel gets every
//! event; a channel failing is logged and never stops the others.

pub mod email;
pub mod ntfy;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::NotificationsConfig;

/// One notification. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
    /// Deep link shown with the message.
    pub link: Option<String>,
    /// Routing hint for topic-based channels (ntfy).
    pub topic: Option<String>,
}

impl NotificationEvent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            link: None,
            topic: None,
        }
    }

    pub fn with_link(mut self, link: Option<String>) -> Self {
        self.link = link;
        self
    }

    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic;
        self
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
}

/// Fan-out dispatcher over the configured channels.
pub struct NotifierMux {
    channels: Vec<Box<dyn Channel>>,
}

impl NotifierMux {
    pub fn from_config(cfg: &NotificationsConfig) -> Result<Self> {
        let mut channels: Vec<Box<dyn Channel>> = Vec::new();

        if let Some(email) = cfg.email.as_ref().filter(|c| c.enabled) {
            channels.push(Box::new(email::EmailChannel::from_config(email)?));
        }
        if let Some(tg) = cfg.telegram.as_ref().filter(|c| c.enabled) {
            channels.push(Box::new(telegram::TelegramChannel::from_config(tg)));
        }
        if let Some(ntfy) = cfg.ntfy.as_ref().filter(|c| c.enabled) {
            channels.push(Box::new(ntfy::NtfyChannel::from_config(ntfy)));
        }

        Ok(Self { channels })
    }

    pub fn from_channels(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver to every channel; partial delivery is expected and fine.
    pub async fn send(&self, ev: &NotificationEvent) {
        tracing::info!(title = %ev.title, body = %ev.body, "notification");
        for ch in &self.channels {
            if let Err(e) = ch.send(ev).await {
                tracing::warn!(channel = ch.name(), error = ?e, "channel send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CollectingChannel {
        seen: Arc<Mutex<Vec<NotificationEvent>>>,
    }

    #[async_trait]
    impl Channel for CollectingChannel {
        fn name(&self) -> &'static str {
            "collector"
        }
        async fn send(&self, ev: &NotificationEvent) -> Result<()> {
            self.seen.lock().unwrap().push(ev.clone());
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl Channel for FailingChannel {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn send(&self, _ev: &NotificationEvent) -> Result<()> {
            Err(anyhow!("channel down"))
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_other() {
        let collector = CollectingChannel::default();
        let mux = NotifierMux::from_channels(vec![
            Box::new(FailingChannel),
            Box::new(collector.clone()),
        ]);

        let ev = NotificationEvent::new("Title", "Body").with_link(Some("https://x".into()));
        mux.send(&ev).await;

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].title, "Title");
        assert_eq!(seen[0].link.as_deref(), Some("https://x"));
    }

    #[tokio::test]
    async fn empty_mux_sends_nowhere_without_error() {
        let mux = NotifierMux::from_channels(Vec::new());
        mux.send(&NotificationEvent::new("t", "b")).await;
        assert_eq!(mux.channel_count(), 0);
    }
}
