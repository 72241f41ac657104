//! Idle time budget helpers.

use std::time::Duration;

use crate::core::target::TargetGoal;

const SECS_PER_MINUTE: u64 = 60;

/// Maximum idle time for a session: `minutes_per_card * goal.count` minutes,
/// regardless of goal mode.
pub fn idle_ceiling(goal: &TargetGoal, max_idle_minutes_per_card: u64) -> Duration {
    let minutes = max_idle_minutes_per_card.saturating_mul(u64::from(goal.count));
    Duration::from_secs(minutes.saturating_mul(SECS_PER_MINUTE))
}

/// Cards assumed dropped after `elapsed` of idling.
pub fn estimated_cards(elapsed: Duration, minutes_per_card: u64) -> u32 {
    let per_card = minutes_per_card.saturating_mul(SECS_PER_MINUTE);
    if per_card == 0 {
        return 0;
    }
    u32::try_from(elapsed.as_secs() / per_card).unwrap_or(u32::MAX)
}

/// Seconds already accumulated toward the next (not yet dropped) card.
pub fn seconds_into_current_card(elapsed: Duration, minutes_per_card: u64) -> u64 {
    let per_card = minutes_per_card.saturating_mul(SECS_PER_MINUTE);
    if per_card == 0 {
        return 0;
    }
    elapsed.as_secs() % per_card
}
