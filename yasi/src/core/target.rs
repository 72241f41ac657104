//! Card target parsing (`tN` / `rN`).

use std::fmt;

use crate::core::types::SourceKind;

/// How a target count is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalMode {
    /// Stop once the game's absolute card count reaches `count`.
    Total,
    /// Stop once `count` cards dropped since the session started.
    Remaining,
}

/// Normalized card target. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGoal {
    pub mode: GoalMode,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target '{spec}': {detail}")]
    InvalidSpecFormat { spec: String, detail: String },
    #[error(
        "target '{spec}' counts total cards, which needs inventory checking; use remaining mode instead (e.g. 'r{count}')"
    )]
    UnsupportedModeForSource { spec: String, count: u32 },
}

/// Parse a target spec for the given progress source.
///
/// Accepts `t`/`r` (either case) followed by a positive decimal count.
/// Total mode is rejected for time-based sources: there is no absolute
/// baseline to compare against.
pub fn parse_target(spec: &str, source: SourceKind) -> Result<TargetGoal, TargetError> {
    let goal = parse_target_spec(spec)?;
    if goal.mode == GoalMode::Total && source == SourceKind::ElapsedTime {
        return Err(TargetError::UnsupportedModeForSource {
            spec: spec.to_string(),
            count: goal.count,
        });
    }
    Ok(goal)
}

fn parse_target_spec(spec: &str) -> Result<TargetGoal, TargetError> {
    let invalid = |detail: &str| TargetError::InvalidSpecFormat {
        spec: spec.to_string(),
        detail: detail.to_string(),
    };

    let mut chars = spec.chars();
    let mode = match chars.next() {
        Some('t' | 'T') => GoalMode::Total,
        Some('r' | 'R') => GoalMode::Remaining,
        Some(_) => return Err(invalid("mode must be 't' (total) or 'r' (remaining)")),
        None => return Err(invalid("target is empty (e.g. 't3', 'r1')")),
    };
    let digits = chars.as_str();
    if digits.is_empty() {
        return Err(invalid("missing card count (e.g. 't3', 'r1')"));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("card count must be a decimal integer"));
    }
    let count: u32 = digits
        .parse()
        .map_err(|_| invalid("card count is out of range"))?;
    if count == 0 {
        return Err(invalid("card count must be positive"));
    }
    Ok(TargetGoal { mode, count })
}

impl TargetGoal {
    /// Whether the goal is met given the current count and the session baseline.
    pub fn is_met(&self, current: u32, baseline: u32) -> bool {
        match self.mode {
            GoalMode::Total => current >= self.count,
            GoalMode::Remaining => current.saturating_sub(baseline) >= self.count,
        }
    }

    /// Cards still needed before the goal is met.
    pub fn outstanding(&self, current: u32, baseline: u32) -> u32 {
        match self.mode {
            GoalMode::Total => self.count.saturating_sub(current),
            GoalMode::Remaining => self
                .count
                .saturating_sub(current.saturating_sub(baseline)),
        }
    }
}

impl fmt::Display for TargetGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.mode {
            GoalMode::Total => 't',
            GoalMode::Remaining => 'r',
        };
        write!(f, "{prefix}{}", self.count)
    }
}
