//! Batch list lines: `<identifier> <targetSpec>`, optionally annotated.
//!
//! An identifier is a bare AppID or a URL containing `/gamecards/<id>` or
//! `/app/<id>`. Annotated lines carry a `# DONE ` or `# FAIL ` prefix, which
//! also makes them comments to tools that do not know about markers.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{AppId, EntryStatus};

pub const DONE_MARKER: &str = "# DONE ";
pub const FAIL_MARKER: &str = "# FAIL ";

static URL_APP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:gamecards|app)/(\d+)").expect("valid app id regex"));

/// Extract an AppID from a bare number or a store/gamecards URL.
pub fn resolve_app_id(raw: &str) -> Option<AppId> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok().map(AppId);
    }
    let caps = URL_APP_ID.captures(raw)?;
    caps.get(1)?.as_str().parse().ok().map(AppId)
}

/// One game from a batch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntry {
    pub raw_identifier: String,
    pub target_spec: String,
    pub app_id: AppId,
    pub status: EntryStatus,
}

impl GameEntry {
    /// Identity used by the batch state table.
    pub fn key(&self) -> String {
        format!("{}:{}", self.app_id, self.target_spec.to_ascii_lowercase())
    }

    /// The unannotated `<identifier> <targetSpec>` form.
    pub fn body(&self) -> String {
        format!("{} {}", self.raw_identifier, self.target_spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("missing target spec after identifier '{0}'")]
    MissingTarget(String),
    #[error("no AppID found in identifier '{0}'")]
    UnresolvableIdentifier(String),
    #[error("unexpected trailing text '{0}'")]
    TrailingText(String),
}

/// Classified batch list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchLine {
    Blank,
    Comment,
    Entry(GameEntry),
    Malformed(LineError),
}

/// Classify a single list line.
///
/// The target spec is not validated here: a bad spec is a per-entry failure
/// reported by the session, while a bad identifier is skipped with a warning.
pub fn parse_line(line: &str) -> BatchLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return BatchLine::Blank;
    }
    for (marker, status) in [
        (DONE_MARKER, EntryStatus::Done),
        (FAIL_MARKER, EntryStatus::Failed),
    ] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return match parse_body(rest, status) {
                Ok(entry) => BatchLine::Entry(entry),
                Err(_) => BatchLine::Comment,
            };
        }
    }
    if trimmed.starts_with('#') {
        return BatchLine::Comment;
    }
    match parse_body(trimmed, EntryStatus::Pending) {
        Ok(entry) => BatchLine::Entry(entry),
        Err(err) => BatchLine::Malformed(err),
    }
}

fn parse_body(body: &str, status: EntryStatus) -> Result<GameEntry, LineError> {
    let mut parts = body.split_whitespace();
    let raw_identifier = parts.next().unwrap_or_default().to_string();
    let target_spec = parts
        .next()
        .ok_or_else(|| LineError::MissingTarget(raw_identifier.clone()))?
        .to_string();
    let rest: Vec<&str> = parts.collect();
    if !rest.is_empty() {
        return Err(LineError::TrailingText(rest.join(" ")));
    }
    let app_id = resolve_app_id(&raw_identifier)
        .ok_or_else(|| LineError::UnresolvableIdentifier(raw_identifier.clone()))?;
    Ok(GameEntry {
        raw_identifier,
        target_spec,
        app_id,
        status,
    })
}

/// Render a line with the marker for `status`.
pub fn annotate_line(line: &str, status: EntryStatus) -> String {
    let body = line.trim();
    match status {
        EntryStatus::Pending => body.to_string(),
        EntryStatus::Done => format!("{DONE_MARKER}{body}"),
        EntryStatus::Failed => format!("{FAIL_MARKER}{body}"),
    }
}
