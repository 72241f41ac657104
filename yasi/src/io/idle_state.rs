//! Timed-mode carry-over (`.yasi/state/idle_state.json`).
//!
//! Holds at most one record: the game whose timed session stopped early,
//! what was still owed, and how far into the next card it got.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::AppId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdleCarryOver {
    pub app_id: AppId,
    /// Canonical REMAINING spec still owed (e.g. `r2`).
    pub target: String,
    /// Idle seconds already spent toward the next card.
    pub seconds_into_current_card: u64,
    pub saved_at: DateTime<Utc>,
}

/// Load the carry-over record for `app_id`.
///
/// A missing file, a record for another game, or an unreadable file yields `None`.
pub fn load_carry_over(path: &Path, app_id: AppId) -> Option<IdleCarryOver> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "could not read idle state, ignoring it");
            return None;
        }
    };
    let state: IdleCarryOver = match serde_json::from_str(&contents) {
        Ok(state) => state,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "invalid idle state, ignoring it");
            return None;
        }
    };
    if state.app_id != app_id {
        debug!(saved = %state.app_id, requested = %app_id, "idle state belongs to another game");
        return None;
    }
    Some(state)
}

/// Atomically write the carry-over record (temp file + rename).
pub fn save_carry_over(path: &Path, state: &IdleCarryOver) -> Result<()> {
    debug!(path = %path.display(), app_id = %state.app_id, target = %state.target, "writing idle state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub fn clear_carry_over(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "idle state cleared");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove idle state {}", path.display())),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("idle state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp idle state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace idle state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(app_id: u32) -> IdleCarryOver {
        IdleCarryOver {
            app_id: AppId(app_id),
            target: "r2".to_string(),
            seconds_into_current_card: 600,
            saved_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .expect("timestamp")
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn saved_record_loads_for_same_game_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("idle_state.json");
        save_carry_over(&path, &record(220)).expect("save");

        assert_eq!(load_carry_over(&path, AppId(220)), Some(record(220)));
        assert_eq!(load_carry_over(&path, AppId(620)), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("idle_state.json");
        save_carry_over(&path, &record(220)).expect("save");
        clear_carry_over(&path).expect("clear");
        clear_carry_over(&path).expect("clear again");
        assert_eq!(load_carry_over(&path, AppId(220)), None);
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("idle_state.json");
        fs::write(&path, "220 r2 600\n").expect("write");
        assert_eq!(load_carry_over(&path, AppId(220)), None);
    }
}
