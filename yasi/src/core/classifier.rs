//! Mapping between session outcomes, process exit codes and batch decisions.

use crate::core::types::{AbortReason, BatchStop, EntryStatus, SessionOutcome};
use crate::exit_codes;

/// What the batch coordinator does with an entry after its session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecision {
    /// Annotate the entry and continue with the next one.
    Mark(EntryStatus),
    /// Leave the entry untouched and stop the batch.
    Halt(BatchStop),
}

/// Decide the entry transition for a finished session.
pub fn decide(outcome: &SessionOutcome) -> EntryDecision {
    match outcome {
        SessionOutcome::Completed => EntryDecision::Mark(EntryStatus::Done),
        SessionOutcome::TimedOut => EntryDecision::Mark(EntryStatus::Failed),
        SessionOutcome::Aborted(AbortReason::Interrupted) => {
            EntryDecision::Halt(BatchStop::Interrupted)
        }
        SessionOutcome::Aborted(_) => EntryDecision::Mark(EntryStatus::Failed),
        SessionOutcome::EnvironmentUnavailable(detail) => {
            EntryDecision::Halt(BatchStop::EnvironmentUnavailable(detail.clone()))
        }
    }
}

/// Process exit code reported by `yasi idle` for an outcome.
pub fn exit_code_for(outcome: &SessionOutcome) -> i32 {
    match outcome {
        SessionOutcome::Completed => exit_codes::OK,
        SessionOutcome::TimedOut => exit_codes::TIMED_OUT,
        SessionOutcome::Aborted(AbortReason::Interrupted) => exit_codes::INTERRUPTED,
        SessionOutcome::Aborted(_) => exit_codes::FAILED,
        SessionOutcome::EnvironmentUnavailable(_) => exit_codes::ENVIRONMENT_UNAVAILABLE,
    }
}

/// Classify the exit code of a child `yasi idle` process.
///
/// `None` means the child was terminated by a signal.
pub fn classify_exit_code(code: Option<i32>) -> SessionOutcome {
    match code {
        Some(exit_codes::OK) => SessionOutcome::Completed,
        Some(exit_codes::ENVIRONMENT_UNAVAILABLE) => SessionOutcome::EnvironmentUnavailable(
            "idle process reported the environment unavailable".to_string(),
        ),
        Some(exit_codes::TIMED_OUT) => SessionOutcome::TimedOut,
        Some(exit_codes::INTERRUPTED) | None => SessionOutcome::Aborted(AbortReason::Interrupted),
        Some(other) => SessionOutcome::Aborted(AbortReason::ProcessFailed(format!(
            "idle process exited with status {other}"
        ))),
    }
}
