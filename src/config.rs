// src/config.rs
//! TOML configuration: global settings, per-source monitors and
//! notification channels. Loaded once per invocation; secrets may be
//! overlaid from the environment so they can stay out of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Credentials from the environment win over the file, so deployments
    /// can keep `config.toml` free of secrets.
    fn apply_env_overrides(&mut self) {
        if let Some(email) = self.notifications.email.as_mut() {
            if let Ok(v) = std::env::var("SMTP_USER") {
                email.username = v;
            }
            if let Ok(v) = std::env::var("SMTP_PASS") {
                email.password = v;
            }
        }
        if let Some(tg) = self.notifications.telegram.as_mut() {
            if let Ok(v) = std::env::var("TELEGRAM_BOT_TOKEN") {
                tg.bot_token = v;
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub user_agent: String,
    /// Attempts per fetch, not the escalation threshold below.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Consecutive failed runs a source may accumulate before an
    /// error-summary notification fires.
    pub escalation_threshold: u32,
    pub state_file: PathBuf,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            max_retries: 3,
            retry_delay_secs: 30,
            escalation_threshold: 3,
            state_file: PathBuf::from("state.json"),
            download_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-source routing hint for the push channel.
    pub ntfy_topic: Option<String>,
    #[serde(flatten)]
    pub extractor: ExtractorConfig,
}

/// Closed set of extractor variants. Adding a source type means adding a
/// variant here, not touching the runner.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum ExtractorConfig {
    SequentialRelease(SequentialOptions),
    VersionedDocument(VersionedOptions),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SequentialOptions {
    /// Anchor text must contain every one of these.
    pub must_contain: Vec<String>,
    /// Anchor text containing any of these is skipped (spin-offs etc.).
    pub exclude: Vec<String>,
    /// Pattern with one capture group yielding the release number.
    pub number_pattern: Option<String>,
    /// Base for resolving relative hrefs; defaults to the source URL.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VersionedOptions {
    /// Text label the version/date patterns anchor on, e.g. a pack name.
    pub label: String,
    /// Keyword that marks candidate document links.
    pub link_keyword: Option<String>,
    pub base_url: Option<String>,
    /// Download and compress the document when an update is seen.
    pub download_artifact: bool,
}

impl Default for VersionedOptions {
    fn default() -> Self {
        Self {
            label: String::new(),
            link_keyword: None,
            base_url: None,
            download_artifact: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationsConfig {
    pub email: Option<EmailConfig>,
    pub telegram: Option<TelegramConfig>,
    pub ntfy: Option<NtfyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_address: String,
    pub to_addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    pub chat_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NtfyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ntfy_server")]
    pub server: String,
    pub default_topic: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [settings]
        user_agent = "pagewatch/0.1"
        max_retries = 2
        retry_delay_secs = 5
        escalation_threshold = 4
        state_file = "state/watch.json"

        [notifications.ntfy]
        default_topic = "watch-default"

        [sources.one_piece]
        name = "One Piece"
        url = "https://example.com/chapters"
        type = "sequential_release"
        ntfy_topic = "onepiece"
        [sources.one_piece.options]
        must_contain = ["One Piece", "Chapter"]
        exclude = ["by Boichi"]

        [sources.wtc_terrain]
        name = "WTC Terrain Pack"
        url = "https://example.com/rules"
        type = "versioned_document"
        enabled = false
        [sources.wtc_terrain.options]
        label = "Terrain Map Pack"
        download_artifact = true
    "#;

    #[test]
    fn parses_sources_settings_and_channels() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.settings.max_retries, 2);
        assert_eq!(cfg.settings.escalation_threshold, 4);
        assert_eq!(cfg.sources.len(), 2);

        let op = &cfg.sources["one_piece"];
        assert!(op.enabled);
        assert_eq!(op.ntfy_topic.as_deref(), Some("onepiece"));
        match &op.extractor {
            ExtractorConfig::SequentialRelease(o) => {
                assert_eq!(o.must_contain, vec!["One Piece", "Chapter"]);
                assert_eq!(o.exclude, vec!["by Boichi"]);
            }
            other => panic!("wrong extractor: {other:?}"),
        }

        let wtc = &cfg.sources["wtc_terrain"];
        assert!(!wtc.enabled);
        match &wtc.extractor {
            ExtractorConfig::VersionedDocument(o) => {
                assert_eq!(o.label, "Terrain Map Pack");
                assert!(o.download_artifact);
            }
            other => panic!("wrong extractor: {other:?}"),
        }

        let ntfy = cfg.notifications.ntfy.unwrap();
        assert!(ntfy.enabled);
        assert_eq!(ntfy.server, "https://ntfy.sh");
        assert_eq!(ntfy.default_topic.as_deref(), Some("watch-default"));
    }

    #[test]
    fn settings_defaults_apply() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.settings.max_retries, 3);
        assert_eq!(cfg.settings.retry_delay_secs, 30);
        assert_eq!(cfg.settings.escalation_threshold, 3);
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn unknown_extractor_type_is_rejected() {
        let bad = r#"
            [sources.x]
            name = "X"
            url = "https://example.com"
            type = "rss_feed"
            [sources.x.options]
        "#;
        assert!(toml::from_str::<AppConfig>(bad).is_err());
    }
}
