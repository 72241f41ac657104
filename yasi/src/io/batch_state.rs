//! Batch state table (`<list>.state.json`).
//!
//! A journal of entry results keyed by `GameEntry::key()`. Each result is
//! written here before the list line is rewritten, and flagged `rendered`
//! once the marker is on disk. A run that died between the two writes is
//! repaired at the start of the next one.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::EntryStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchState {
    pub entries: BTreeMap<String, EntryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryRecord {
    pub status: EntryStatus,
    /// Session outcome label (`completed`, `timed_out`, `aborted`).
    pub outcome: String,
    /// Whether the list file already carries the marker.
    pub rendered: bool,
    pub updated_at: DateTime<Utc>,
}

impl BatchState {
    pub fn record(&mut self, key: &str, status: EntryStatus, outcome: &str, at: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            EntryRecord {
                status,
                outcome: outcome.to_string(),
                rendered: false,
                updated_at: at,
            },
        );
    }

    pub fn mark_rendered(&mut self, key: &str) {
        if let Some(record) = self.entries.get_mut(key) {
            record.rendered = true;
        }
    }

    /// Results whose marker never made it into the list file.
    pub fn unrendered(&self) -> impl Iterator<Item = (&str, &EntryRecord)> {
        self.entries
            .iter()
            .filter(|(_, record)| !record.rendered)
            .map(|(key, record)| (key.as_str(), record))
    }
}

/// Load the state table; a missing file is an empty table.
pub fn load_batch_state(path: &Path) -> Result<BatchState> {
    if !path.exists() {
        debug!(path = %path.display(), "no batch state yet");
        return Ok(BatchState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read batch state {}", path.display()))?;
    let state: BatchState = serde_json::from_str(&contents)
        .with_context(|| format!("parse batch state {}", path.display()))?;
    debug!(path = %path.display(), entries = state.entries.len(), "batch state loaded");
    Ok(state)
}

/// Atomically write the state table (temp file + rename).
pub fn write_batch_state(path: &Path, state: &BatchState) -> Result<()> {
    debug!(path = %path.display(), entries = state.entries.len(), "writing batch state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp batch state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace batch state {}", path.display()))?;
    Ok(())
}
