// src/extract/sequential.rs
//! Sequentially numbered releases (chapters, issues). Candidates are
//! anchors whose text passes the include/exclude keyword filters and whose
//! text yields a number under the configured pattern; the winner is the
//! candidate with the highest number, never the first or last match.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::SequentialOptions;
use crate::error::MonitorError;
use crate::extract::{anchors, resolve_href, Extraction, Snapshot};

const DEFAULT_NUMBER_PATTERN: &str = r"Chapter\s*(\d+)";

struct Candidate {
    number: u64,
    title: String,
    url: String,
}

pub fn extract(
    opts: &SequentialOptions,
    source_url: &str,
    content: &str,
    prior: Option<&Snapshot>,
    now: DateTime<Utc>,
) -> Result<Extraction, MonitorError> {
    let pattern = opts
        .number_pattern
        .as_deref()
        .unwrap_or(DEFAULT_NUMBER_PATTERN);
    let re = Regex::new(pattern)
        .map_err(|e| MonitorError::Extraction(format!("invalid number pattern: {e}")))?;
    let base = opts.base_url.as_deref().unwrap_or(source_url);

    let mut candidates: Vec<Candidate> = Vec::new();
    for a in anchors(content) {
        if !opts.must_contain.iter().all(|k| a.text.contains(k)) {
            continue;
        }
        if opts.exclude.iter().any(|k| a.text.contains(k)) {
            continue;
        }
        let Some(caps) = re.captures(&a.text) else {
            continue;
        };
        let Some(number) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
            continue;
        };
        candidates.push(Candidate {
            number,
            title: a.text.clone(),
            url: resolve_href(base, &a.href),
        });
    }

    let latest = candidates
        .into_iter()
        .max_by_key(|c| c.number)
        .ok_or_else(|| MonitorError::Extraction("no matching release link found".to_string()))?;

    let prior_number = match prior {
        Some(Snapshot::SequentialRelease { number, .. }) => Some(*number),
        _ => None,
    };
    // Strictly greater; first observation only establishes the baseline.
    let updated = prior_number.is_some_and(|p| latest.number > p);

    let snapshot = Snapshot::SequentialRelease {
        number: latest.number,
        title: latest.title,
        url: latest.url.clone(),
        observed_at: now,
    };

    Ok(Extraction {
        notify_link: updated.then_some(latest.url),
        snapshot,
        updated,
    })
}
