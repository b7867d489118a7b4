// src/error.rs
use thiserror::Error;

/// Closed set of failure kinds the runner has to tell apart.
///
/// `Fetch` and `Extraction` feed the per-source escalation counter;
/// `Persistence` aborts the whole pass so in-memory state is never
/// silently dropped.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("state persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl MonitorError {
    /// True for failures that are contained within one source's processing.
    pub fn is_per_source(&self) -> bool {
        !matches!(self, MonitorError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
