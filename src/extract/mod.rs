// src/extract/mod.rs
//! Extractors turn fetched page content into typed snapshots and an update
//! decision. They are pure: same content, prior snapshot and clock in, same
//! result out. All page-specific heuristics live behind the variant options.

pub mod sequential;
pub mod versioned;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::error::MonitorError;

/// Latest extracted fact for one source. Variants carry their own
/// comparison keys; `observed_at` is metadata and never compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    SequentialRelease {
        number: u64,
        title: String,
        url: String,
        observed_at: DateTime<Utc>,
    },
    VersionedDocument {
        version: Option<String>,
        last_update: Option<String>,
        document_url: Option<String>,
        observed_at: DateTime<Utc>,
    },
}

impl Snapshot {
    /// One-line description for run summaries and notification bodies.
    pub fn summary(&self) -> String {
        match self {
            Snapshot::SequentialRelease { number, .. } => format!("chapter {number}"),
            Snapshot::VersionedDocument {
                version,
                last_update,
                ..
            } => {
                let v = version
                    .as_deref()
                    .map(|v| format!("v{v}"))
                    .unwrap_or_else(|| "v?".to_string());
                format!("{v}, {}", last_update.as_deref().unwrap_or("n/a"))
            }
        }
    }
}

/// Result of one extraction: the new snapshot, whether it supersedes the
/// prior one, and the link to put in a change notification.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub snapshot: Snapshot,
    pub updated: bool,
    pub notify_link: Option<String>,
}

/// Dispatch over the closed variant set.
pub fn extract(
    cfg: &ExtractorConfig,
    source_url: &str,
    content: &str,
    prior: Option<&Snapshot>,
    now: DateTime<Utc>,
) -> Result<Extraction, MonitorError> {
    match cfg {
        ExtractorConfig::SequentialRelease(opts) => {
            sequential::extract(opts, source_url, content, prior, now)
        }
        ExtractorConfig::VersionedDocument(opts) => {
            versioned::extract(opts, source_url, content, prior, now)
        }
    }
}

/// An `<a href>` found in the page, with tag-stripped, entity-decoded text.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

/// Scan every anchor in the document.
pub fn anchors(content: &str) -> Vec<Anchor> {
    static RE_A: OnceCell<Regex> = OnceCell::new();
    let re = RE_A.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
    });

    re.captures_iter(content)
        .map(|c| Anchor {
            href: c[1].trim().to_string(),
            text: clean_text(&c[2]),
        })
        .collect()
}

/// Strip tags, decode entities and collapse whitespace.
pub fn clean_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let out = re_tags.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Whole-document visible text for pattern matching outside anchors.
/// Horizontal whitespace is collapsed but line structure is kept, since
/// the versioned-document patterns match within a line.
pub fn page_text(content: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_HWS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_hws = RE_HWS.get_or_init(|| Regex::new(r"[ \t]+").unwrap());

    let out = re_tags.replace_all(content, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = re_hws.replace_all(&out, " ");
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve a possibly-relative href against the page it came from.
pub fn resolve_href(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => href.to_string(),
    }
}
