//! Progress sources: where the session's card count comes from.
//!
//! A source only answers "how many cards now?". Scheduling, retries and goal
//! evaluation belong to the session controller.

use std::time::{Duration, Instant};

use crate::core::budget::estimated_cards;
use crate::core::types::{AppId, ProgressSnapshot, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    /// The listing could not be read this time; the next poll may succeed.
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),
    /// The account's inventory is private; retrying cannot help.
    #[error("inventory is private: {0}")]
    PrivateInventory(String),
    /// Steam cannot be reached at all from this machine.
    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),
}

pub trait ProgressSource {
    fn kind(&self) -> SourceKind;

    /// Mark the moment idling starts. Time-based sources measure from here.
    fn begin(&mut self, _at: Instant) {}

    fn snapshot(&mut self, app_id: AppId, now: Instant) -> Result<ProgressSnapshot, ProgressError>;
}

/// Estimates drops as `floor(elapsed / minutes_per_card)`.
///
/// `carried` seeds the estimate with idle time saved by an earlier session
/// for the same game, so a resumed session finishes the partial card first.
#[derive(Debug, Clone)]
pub struct ElapsedTimeEstimateSource {
    minutes_per_card: u64,
    carried: Duration,
    started_at: Option<Instant>,
    last_count: u32,
}

impl ElapsedTimeEstimateSource {
    pub fn new(minutes_per_card: u64, carried: Duration) -> Self {
        Self {
            minutes_per_card,
            carried,
            started_at: None,
            last_count: 0,
        }
    }

    /// Total idle time credited so far, including carried-over time.
    pub fn credited(&self, now: Instant) -> Duration {
        let idled = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        self.carried + idled
    }

    pub fn minutes_per_card(&self) -> u64 {
        self.minutes_per_card
    }
}

impl ProgressSource for ElapsedTimeEstimateSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ElapsedTime
    }

    fn begin(&mut self, at: Instant) {
        self.started_at = Some(at);
    }

    fn snapshot(&mut self, _app_id: AppId, now: Instant) -> Result<ProgressSnapshot, ProgressError> {
        let estimate = estimated_cards(self.credited(now), self.minutes_per_card);
        self.last_count = self.last_count.max(estimate);
        Ok(ProgressSnapshot {
            absolute_count: self.last_count,
            observed_at: now,
        })
    }
}
