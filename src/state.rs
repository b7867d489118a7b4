// src/state.rs
//! Durable per-source state: the last snapshot plus a consecutive-error
//! counter. The on-disk format is a flat JSON object mapping `<id>` to the
//! snapshot and `<id>_errors` to the counter. Writes go through a temp
//! file and a rename so a partial state file is never visible.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::error::MonitorError;
use crate::extract::Snapshot;

const ERRORS_SUFFIX: &str = "_errors";

#[derive(Debug, Clone, Default)]
pub struct SourceState {
    pub snapshot: Option<Snapshot>,
    pub consecutive_errors: u32,
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<String, SourceState>,
}

impl StateStore {
    /// Load state from `path`; a missing file means empty initial state.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    entries: BTreeMap::new(),
                });
            }
            Err(e) => {
                return Err(MonitorError::Persistence(
                    anyhow::Error::new(e).context(format!("reading {}", path.display())),
                ));
            }
        };

        let map: Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
            MonitorError::Persistence(
                anyhow::Error::new(e).context(format!("parsing {}", path.display())),
            )
        })?;

        let mut entries: BTreeMap<String, SourceState> = BTreeMap::new();
        for (key, value) in map {
            if let Some(id) = key.strip_suffix(ERRORS_SUFFIX) {
                let count = value.as_u64().unwrap_or(0) as u32;
                entries.entry(id.to_string()).or_default().consecutive_errors = count;
            } else {
                match serde_json::from_value::<Snapshot>(value) {
                    Ok(snap) => entries.entry(key).or_default().snapshot = Some(snap),
                    Err(e) => {
                        // A stale entry (schema drift) is dropped, not fatal;
                        // the source just re-baselines on its next run.
                        tracing::warn!(source = %key, error = %e, "discarding unreadable state entry");
                    }
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, id: &str) -> SourceState {
        self.entries.get(id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, id: &str, snapshot: Snapshot) {
        self.entries.entry(id.to_string()).or_default().snapshot = Some(snapshot);
    }

    /// Bump the consecutive-error counter and return the new value.
    pub fn increment_error(&mut self, id: &str) -> u32 {
        let entry = self.entries.entry(id.to_string()).or_default();
        entry.consecutive_errors += 1;
        entry.consecutive_errors
    }

    pub fn reset_errors(&mut self, id: &str) {
        self.entries.entry(id.to_string()).or_default().consecutive_errors = 0;
    }

    /// Clear everything and persist immediately (operator reset).
    pub fn reset_all(&mut self) -> Result<(), MonitorError> {
        self.entries.clear();
        self.save()
    }

    /// Persist the full mapping atomically. Called once at end of a pass.
    pub fn save(&self) -> Result<(), MonitorError> {
        let mut map = Map::new();
        for (id, state) in &self.entries {
            if let Some(snap) = &state.snapshot {
                map.insert(
                    id.clone(),
                    serde_json::to_value(snap)
                        .map_err(|e| MonitorError::Persistence(e.into()))?,
                );
            }
            map.insert(
                format!("{id}{ERRORS_SUFFIX}"),
                Value::from(state.consecutive_errors),
            );
        }

        let bytes = serde_json::to_vec_pretty(&Value::Object(map))
            .map_err(|e| MonitorError::Persistence(e.into()))?;

        self.write_atomic(&bytes)
            .map_err(MonitorError::Persistence)
    }

    fn write_atomic(&self, bytes: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
