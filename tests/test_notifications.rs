//! The synthetic test-notification pass: one event per distinct topic plus
//! the default route, with state untouched.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use pagewatch::config::AppConfig;
use pagewatch::notify::{Channel, NotificationEvent, NotifierMux};
use pagewatch::runner::send_test_notifications;

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

fn config(toml_src: &str) -> AppConfig {
    toml::from_str(toml_src).unwrap()
}

#[tokio::test]
async fn one_event_per_distinct_topic_plus_default() {
    let cfg = config(
        r#"
        [notifications.ntfy]
        default_topic = "general"

        [sources.a]
        name = "A"
        url = "https://x/a"
        type = "sequential_release"
        ntfy_topic = "shared"
        [sources.a.options]

        [sources.b]
        name = "B"
        url = "https://x/b"
        type = "sequential_release"
        ntfy_topic = "shared"
        [sources.b.options]

        [sources.c]
        name = "C"
        url = "https://x/c"
        type = "sequential_release"
        ntfy_topic = "solo"
        [sources.c.options]

        [sources.off]
        name = "Off"
        url = "https://x/off"
        type = "sequential_release"
        enabled = false
        ntfy_topic = "never"
        [sources.off.options]
    "#,
    );

    let collector = CollectingChannel::default();
    let mux = NotifierMux::from_channels(vec![Box::new(collector.clone())]);

    send_test_notifications(&cfg, &mux).await;

    let mut topics: Vec<Option<String>> = collector
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.topic.clone())
        .collect();
    topics.sort();

    // "shared" once despite two sources, "solo" once, default "general"
    // once, disabled source's topic never.
    assert_eq!(
        topics,
        vec![
            Some("general".to_string()),
            Some("shared".to_string()),
            Some("solo".to_string()),
        ]
    );
}

#[tokio::test]
async fn default_not_duplicated_when_a_source_uses_it() {
    let cfg = config(
        r#"
        [notifications.ntfy]
        default_topic = "general"

        [sources.a]
        name = "A"
        url = "https://x/a"
        type = "sequential_release"
        ntfy_topic = "general"
        [sources.a.options]
    "#,
    );

    let collector = CollectingChannel::default();
    let mux = NotifierMux::from_channels(vec![Box::new(collector.clone())]);
    send_test_notifications(&cfg, &mux).await;

    let seen = collector.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].topic.as_deref(), Some("general"));
}

#[tokio::test]
async fn no_topics_still_exercises_every_channel_once() {
    let cfg = config(
        r#"
        [sources.a]
        name = "A"
        url = "https://x/a"
        type = "sequential_release"
        [sources.a.options]
    "#,
    );

    let collector = CollectingChannel::default();
    let mux = NotifierMux::from_channels(vec![Box::new(collector.clone())]);
    send_test_notifications(&cfg, &mux).await;

    let seen = collector.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].topic, None);
}
