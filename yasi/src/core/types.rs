//! Shared deterministic types for the idling core.
//!
//! These types define stable contracts between the session controller, the
//! batch coordinator and the CLI. They carry no I/O and must stay
//! deterministic across runs.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Steam's numeric identifier for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Annotation state of a batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Done,
    Failed,
}

/// Which progress source drives a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live card counts from the public inventory listing.
    Inventory,
    /// Card drops estimated from elapsed idle time.
    ElapsedTime,
}

/// Card count observed by a progress source at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub absolute_count: u32,
    pub observed_at: Instant,
}

/// States of the per-game idle session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    CheckingPrecondition,
    Active,
    Stopping,
    Completed,
    TimedOut,
    Aborted,
}

/// Why a session ended without reaching its goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The identifier did not contain an AppID.
    InvalidIdentifier(String),
    /// The target spec was malformed or unsupported by the active source.
    InvalidSpec(String),
    /// The inventory listing is private; retrying cannot help.
    PrivateInventory,
    /// The initial inventory count could not be read.
    InventoryUnavailable(String),
    /// The game-presence session could not be acquired.
    PresenceUnavailable(String),
    /// The game-presence session ended while idling.
    PresenceLost(String),
    /// A child idle process failed without a more specific outcome.
    ProcessFailed(String),
    /// The operator interrupted the session.
    Interrupted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier(detail) => write!(f, "invalid identifier: {detail}"),
            Self::InvalidSpec(detail) => write!(f, "invalid target: {detail}"),
            Self::PrivateInventory => write!(f, "inventory is private"),
            Self::InventoryUnavailable(detail) => write!(f, "inventory unavailable: {detail}"),
            Self::PresenceUnavailable(detail) => write!(f, "presence unavailable: {detail}"),
            Self::PresenceLost(detail) => write!(f, "presence lost: {detail}"),
            Self::ProcessFailed(detail) => write!(f, "{detail}"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Terminal result of one idle session, produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    TimedOut,
    Aborted(AbortReason),
    /// The idling environment (e.g. the Steam client) is not available. Not a
    /// per-entry failure: the batch halts and the entry stays pending.
    EnvironmentUnavailable(String),
}

impl SessionOutcome {
    /// Short stable label used in CLI output and the batch state table.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Aborted(AbortReason::Interrupted) => "interrupted",
            Self::Aborted(_) => "aborted",
            Self::EnvironmentUnavailable(_) => "environment_unavailable",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Aborted(reason) => write!(f, "aborted ({reason})"),
            Self::EnvironmentUnavailable(detail) => {
                write!(f, "environment unavailable ({detail})")
            }
        }
    }
}

/// Why a batch run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStop {
    /// Every line was visited.
    Finished,
    /// A session reported the environment unavailable; remaining entries untouched.
    EnvironmentUnavailable(String),
    /// The operator interrupted the batch.
    Interrupted,
}
