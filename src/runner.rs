// src/runner.rs
//! One pass over all configured sources. Each source walks
//! fetch → extract → diff → persist, with failures contained to that
//! source and escalated only after enough consecutive bad runs.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::Utc;

use crate::artifact::ArtifactHook;
use crate::config::{AppConfig, ExtractorConfig, SourceConfig};
use crate::error::MonitorError;
use crate::extract::{self, Snapshot};
use crate::fetch::PageFetcher;
use crate::notify::{NotificationEvent, NotifierMux};
use crate::state::StateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Updated,
    Unchanged,
    Skipped,
    Failed { errors: u32, escalated: bool },
}

#[derive(Debug, Default)]
pub struct PassSummary {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl PassSummary {
    pub fn outcome(&self, id: &str) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|(k, _)| k == id).map(|(_, o)| o)
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == SourceOutcome::Updated)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SourceOutcome::Failed { .. }))
            .count()
    }
}

pub struct Runner<'a> {
    fetcher: &'a dyn PageFetcher,
    notifier: &'a NotifierMux,
    artifacts: Option<&'a dyn ArtifactHook>,
    escalation_threshold: u32,
}

impl<'a> Runner<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        notifier: &'a NotifierMux,
        escalation_threshold: u32,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            artifacts: None,
            escalation_threshold,
        }
    }

    pub fn with_artifacts(mut self, hook: &'a dyn ArtifactHook) -> Self {
        self.artifacts = Some(hook);
        self
    }

    /// Process every source once, then persist the state exactly once.
    /// Per-source failures never abort the pass; only a persistence
    /// failure does.
    pub async fn run_pass(
        &self,
        sources: &BTreeMap<String, SourceConfig>,
        store: &mut StateStore,
    ) -> Result<PassSummary, MonitorError> {
        let mut summary = PassSummary::default();

        for (id, cfg) in sources {
            let outcome = if cfg.enabled {
                self.run_source(id, cfg, store).await
            } else {
                tracing::debug!(source = %id, "disabled, skipping");
                SourceOutcome::Skipped
            };
            summary.outcomes.push((id.clone(), outcome));
        }

        store.save()?;
        Ok(summary)
    }

    async fn run_source(
        &self,
        id: &str,
        cfg: &SourceConfig,
        store: &mut StateStore,
    ) -> SourceOutcome {
        tracing::info!(source = %cfg.name, url = %cfg.url, "checking");

        let content = match self.fetcher.fetch(&cfg.url).await {
            Ok(body) => body,
            Err(e) => return self.escalate(id, cfg, e, store).await,
        };

        let prior = store.get(id).snapshot;
        let extraction = match extract::extract(
            &cfg.extractor,
            &cfg.url,
            &content,
            prior.as_ref(),
            Utc::now(),
        ) {
            Ok(x) => x,
            Err(e) => return self.escalate(id, cfg, e, store).await,
        };

        let outcome = if extraction.updated {
            let (title, body) = update_message(cfg, &extraction.snapshot);
            let ev = NotificationEvent::new(title, body)
                .with_link(extraction.notify_link.clone())
                .with_topic(cfg.ntfy_topic.clone());
            self.notifier.send(&ev).await;

            if let Some(hook) = self.artifacts {
                if wants_artifact(cfg) {
                    hook.on_update(&cfg.name, &extraction.snapshot).await;
                }
            }
            SourceOutcome::Updated
        } else {
            tracing::info!(
                source = %cfg.name,
                latest = %extraction.snapshot.summary(),
                "no update"
            );
            SourceOutcome::Unchanged
        };

        // Snapshot advances even without an update; success resets the
        // error budget.
        store.set(id, extraction.snapshot);
        store.reset_errors(id);
        outcome
    }

    async fn escalate(
        &self,
        id: &str,
        cfg: &SourceConfig,
        err: MonitorError,
        store: &mut StateStore,
    ) -> SourceOutcome {
        let count = store.increment_error(id);
        let escalated = count > self.escalation_threshold;

        if escalated {
            let ev = NotificationEvent::new(
                format!("Monitor error: {}", cfg.name),
                format!("Failing for {count} consecutive runs: {}", truncate(&err.to_string(), 100)),
            )
            .with_link(Some(cfg.url.clone()))
            .with_topic(cfg.ntfy_topic.clone());
            self.notifier.send(&ev).await;
        } else {
            tracing::warn!(
                source = %cfg.name,
                errors = count,
                threshold = self.escalation_threshold,
                error = %err,
                "source failed, not escalating yet"
            );
        }

        SourceOutcome::Failed { errors: count, escalated }
    }
}

fn wants_artifact(cfg: &SourceConfig) -> bool {
    matches!(
        &cfg.extractor,
        ExtractorConfig::VersionedDocument(o) if o.download_artifact
    )
}

fn update_message(cfg: &SourceConfig, snapshot: &Snapshot) -> (String, String) {
    match snapshot {
        Snapshot::SequentialRelease { number, .. } => (
            format!("New release: {}", cfg.name),
            format!("Chapter {number} available!"),
        ),
        Snapshot::VersionedDocument { .. } => (
            format!("{} updated!", cfg.name),
            format!("New version: {}", snapshot.summary()),
        ),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Send a synthetic event through every configured channel and topic,
/// without touching state. One event per distinct per-source topic, plus
/// the default route if it was not already covered.
pub async fn send_test_notifications(config: &AppConfig, notifier: &NotifierMux) {
    let mut tested: BTreeSet<String> = BTreeSet::new();

    for (id, src) in config.sources.iter().filter(|(_, s)| s.enabled) {
        let Some(topic) = src.ntfy_topic.clone() else {
            continue;
        };
        if !tested.insert(topic.clone()) {
            continue;
        }
        let ev = NotificationEvent::new(
            format!("Test: {}", src.name),
            "If you can read this, notifications are working.",
        )
        .with_link(Some("https://example.com".to_string()))
        .with_topic(Some(topic));
        tracing::info!(source = %id, "sending test notification");
        notifier.send(&ev).await;
    }

    let default_topic = config
        .notifications
        .ntfy
        .as_ref()
        .and_then(|n| n.default_topic.clone());
    let default_covered = default_topic
        .as_ref()
        .is_some_and(|t| tested.contains(t));

    if !default_covered {
        let ev = NotificationEvent::new(
            "Test: default route",
            "If you can read this, notifications are working.",
        )
        .with_link(Some("https://example.com".to_string()))
        .with_topic(default_topic);
        notifier.send(&ev).await;
    }
}
