// src/extract/versioned.rs
//! Versioned documents (rule packs, PDFs) identified by a text label.
//! Primary strategy captures version and last-update date in one pass;
//! when that misses, independent fallback patterns recover whichever
//! component is present. A snapshot with only a date is still valid; only
//! both components missing is an extraction failure.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::VersionedOptions;
use crate::error::MonitorError;
use crate::extract::{anchors, page_text, resolve_href, Extraction, Snapshot};

pub fn extract(
    opts: &VersionedOptions,
    source_url: &str,
    content: &str,
    prior: Option<&Snapshot>,
    now: DateTime<Utc>,
) -> Result<Extraction, MonitorError> {
    if opts.label.is_empty() {
        return Err(MonitorError::Extraction(
            "versioned_document requires a label option".to_string(),
        ));
    }

    let text = page_text(content);
    let label = regex::escape(&opts.label);

    let combined = Regex::new(&format!(
        r"(?i){label}[^\n]*?\((\d+\.?\d*)\)[^\n]*?Last update[:\s]*(\d{{1,2}}/\d{{1,2}}/\d{{4}})"
    ))
    .map_err(|e| MonitorError::Extraction(format!("bad label pattern: {e}")))?;

    let (version, last_update) = if let Some(caps) = combined.captures(&text) {
        (Some(caps[1].to_string()), Some(caps[2].to_string()))
    } else {
        let version_re = Regex::new(&format!(r"(?i){label}[^\n]*?\((\d+\.?\d*)\)"))
            .map_err(|e| MonitorError::Extraction(format!("bad label pattern: {e}")))?;
        let date_re = Regex::new(&format!(
            r"(?i){label}[\s\S]*?Last update[:\s]*(\d{{1,2}}/\d{{1,2}}/\d{{4}})"
        ))
        .map_err(|e| MonitorError::Extraction(format!("bad label pattern: {e}")))?;

        (
            version_re.captures(&text).map(|c| c[1].to_string()),
            date_re.captures(&text).map(|c| c[1].to_string()),
        )
    };

    if version.is_none() && last_update.is_none() {
        return Err(MonitorError::Extraction(format!(
            "no version or last-update info for '{}' found in page",
            opts.label
        )));
    }

    let base = opts.base_url.as_deref().unwrap_or(source_url);
    let document_url = find_document_link(opts, content, base);

    let prior_keys = match prior {
        Some(Snapshot::VersionedDocument {
            version,
            last_update,
            ..
        }) => Some((version.clone(), last_update.clone())),
        _ => None,
    };
    // Any component changing counts as an update; the first observation
    // only establishes the baseline.
    let updated = prior_keys
        .is_some_and(|(pv, pd)| pv != version || pd != last_update);

    let snapshot = Snapshot::VersionedDocument {
        version,
        last_update,
        document_url,
        observed_at: now,
    };

    Ok(Extraction {
        snapshot,
        updated,
        notify_link: updated.then(|| source_url.to_string()),
    })
}

/// Locate the document behind the label: an anchor whose href or text
/// carries the link keyword and that points at a PDF.
fn find_document_link(opts: &VersionedOptions, content: &str, base: &str) -> Option<String> {
    let keyword = opts
        .link_keyword
        .clone()
        .unwrap_or_else(|| opts.label.to_lowercase());
    let keyword = keyword.to_lowercase();

    anchors(content).into_iter().find_map(|a| {
        let href_l = a.href.to_lowercase();
        let text_l = a.text.to_lowercase();
        let mentions = href_l.contains(&keyword) || text_l.contains(&keyword);
        let is_pdf = href_l.ends_with(".pdf") || href_l.contains("pdf");
        (mentions && is_pdf).then(|| resolve_href(base, &a.href))
    })
}
