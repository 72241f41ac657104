//! Per-game idle session controller.
//!
//! Drives one game through
//! `INITIALIZING → CHECKING_PRECONDITION → ACTIVE → STOPPING → {COMPLETED | TIMED_OUT | ABORTED}`
//! and reports exactly one outcome. The controller owns all scheduling: the
//! progress source only answers "how many cards now?" and the presence
//! provider only keeps the game looking alive.
//!
//! Presence acquired in ACTIVE is held by a [`ScopedPresence`] guard, so it is
//! released on every exit path, including early returns and panics.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::core::budget::idle_ceiling;
use crate::core::entry::resolve_app_id;
use crate::core::target::{GoalMode, TargetGoal, parse_target};
use crate::core::types::{AbortReason, AppId, SessionOutcome, SessionState, SourceKind};
use crate::io::clock::Clock;
use crate::io::presence::{GamePresenceSession, PresenceError, PresenceProvider};
use crate::io::progress::{ProgressError, ProgressSource};
use crate::io::signal::StopSignal;

/// Keep-alive ticks of a fast presence check.
pub const FAST_CHECK_TICKS: u32 = 5;

/// Timing knobs for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time between progress checks while ACTIVE.
    pub interval: Duration,
    /// Idle ceiling per target card, in minutes.
    pub max_idle_minutes_per_card: u64,
}

/// What one session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub app_id: Option<AppId>,
    pub goal: Option<TargetGoal>,
    pub outcome: SessionOutcome,
    /// Count at the start of the session, once taken.
    pub baseline: Option<u32>,
    /// Most recent successful count.
    pub last_count: Option<u32>,
    /// Time spent ACTIVE (presence held).
    pub idled: Duration,
    /// Progress checks performed while ACTIVE.
    pub polls: u32,
}

impl SessionReport {
    fn new() -> Self {
        Self {
            app_id: None,
            goal: None,
            outcome: SessionOutcome::Completed,
            baseline: None,
            last_count: None,
            idled: Duration::ZERO,
            polls: 0,
        }
    }

    /// Report for a run that never reached the polling loop.
    pub fn for_outcome(app_id: Option<AppId>, outcome: SessionOutcome) -> Self {
        Self {
            app_id,
            outcome,
            ..Self::new()
        }
    }

    /// Cards still owed toward the goal, if a goal and counts are known.
    pub fn outstanding(&self) -> Option<u32> {
        let goal = self.goal?;
        let baseline = self.baseline.unwrap_or(0);
        Some(goal.outstanding(self.last_count.unwrap_or(baseline), baseline))
    }
}

/// Releases the wrapped presence session when dropped.
pub struct ScopedPresence<S: GamePresenceSession> {
    session: Option<S>,
}

impl<S: GamePresenceSession> ScopedPresence<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn keep_alive(&mut self) -> Result<(), PresenceError> {
        match self.session.as_mut() {
            Some(session) => session.keep_alive(),
            None => Err(PresenceError::Lost("presence already released".to_string())),
        }
    }

    /// Release now. Later calls and the drop are no-ops.
    pub fn release(&mut self) -> Result<(), PresenceError> {
        match self.session.take() {
            Some(mut session) => session.release(),
            None => Ok(()),
        }
    }
}

impl<S: GamePresenceSession> Drop for ScopedPresence<S> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(err = %err, "presence release failed");
        }
    }
}

/// The idle session state machine.
pub struct SessionController<'a, P: PresenceProvider> {
    presence: &'a P,
    source: &'a mut dyn ProgressSource,
    clock: &'a dyn Clock,
    stop: &'a StopSignal,
    config: SessionConfig,
    state: SessionState,
}

enum Step<T> {
    Continue(T),
    Finish(SessionOutcome),
}

impl<'a, P: PresenceProvider> SessionController<'a, P> {
    pub fn new(
        presence: &'a P,
        source: &'a mut dyn ProgressSource,
        clock: &'a dyn Clock,
        stop: &'a StopSignal,
        config: SessionConfig,
    ) -> Self {
        Self {
            presence,
            source,
            clock,
            stop,
            config,
            state: SessionState::Initializing,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one session for `raw_identifier` until it reaches a terminal state.
    #[instrument(skip(self), fields(source = ?self.source.kind()))]
    pub fn run(&mut self, raw_identifier: &str, target_spec: &str) -> SessionReport {
        let mut report = SessionReport::new();
        self.state = SessionState::Initializing;
        debug!(state = ?self.state, "session starting");

        let (app_id, goal) = match self.initialize(raw_identifier, target_spec) {
            Step::Continue(resolved) => resolved,
            Step::Finish(outcome) => return self.finish(report, outcome),
        };
        report.app_id = Some(app_id);
        report.goal = Some(goal);

        self.enter(SessionState::CheckingPrecondition, app_id);
        match self.check_precondition(app_id, &goal, &mut report) {
            Step::Continue(()) => {}
            Step::Finish(outcome) => return self.finish(report, outcome),
        }

        self.enter(SessionState::Active, app_id);
        let outcome = self.idle(app_id, &goal, &mut report);
        self.finish(report, outcome)
    }

    fn initialize(&mut self, raw_identifier: &str, target_spec: &str) -> Step<(AppId, TargetGoal)> {
        let Some(app_id) = resolve_app_id(raw_identifier) else {
            return Step::Finish(SessionOutcome::Aborted(AbortReason::InvalidIdentifier(
                format!("no AppID found in '{raw_identifier}'"),
            )));
        };
        match parse_target(target_spec, self.source.kind()) {
            Ok(goal) => Step::Continue((app_id, goal)),
            Err(err) => {
                warn!(app_id = %app_id, err = %err, "target rejected");
                Step::Finish(SessionOutcome::Aborted(AbortReason::InvalidSpec(
                    err.to_string(),
                )))
            }
        }
    }

    fn check_precondition(
        &mut self,
        app_id: AppId,
        goal: &TargetGoal,
        report: &mut SessionReport,
    ) -> Step<()> {
        if self.stop.is_raised() {
            return Step::Finish(SessionOutcome::Aborted(AbortReason::Interrupted));
        }
        if let Err(err) = self.presence.check_environment() {
            return Step::Finish(presence_failure(err));
        }
        if self.source.kind() != SourceKind::Inventory {
            return Step::Continue(());
        }

        let count = match self.source.snapshot(app_id, self.clock.now()) {
            Ok(snapshot) => snapshot.absolute_count,
            Err(err) => {
                warn!(app_id = %app_id, err = %err, "initial card count unavailable");
                return Step::Finish(match err {
                    ProgressError::PrivateInventory(_) => {
                        SessionOutcome::Aborted(AbortReason::PrivateInventory)
                    }
                    ProgressError::EnvironmentUnavailable(detail) => {
                        SessionOutcome::EnvironmentUnavailable(detail)
                    }
                    ProgressError::InventoryUnavailable(detail) => {
                        SessionOutcome::Aborted(AbortReason::InventoryUnavailable(detail))
                    }
                });
            }
        };
        report.baseline = Some(count);
        report.last_count = Some(count);
        info!(app_id = %app_id, cards = count, goal = %goal, "initial card count");

        if goal.mode == GoalMode::Total && goal.is_met(count, count) {
            info!(app_id = %app_id, cards = count, "target already met, not idling");
            return Step::Finish(SessionOutcome::Completed);
        }
        Step::Continue(())
    }

    fn idle(&mut self, app_id: AppId, goal: &TargetGoal, report: &mut SessionReport) -> SessionOutcome {
        let session = match self.presence.acquire(app_id) {
            Ok(session) => session,
            Err(err) => return presence_failure(err),
        };
        let mut presence = ScopedPresence::new(session);

        let started = self.clock.now();
        self.source.begin(started);

        let baseline = match report.baseline {
            Some(baseline) => baseline,
            None => match self.source.snapshot(app_id, started) {
                Ok(snapshot) => snapshot.absolute_count,
                Err(err) => {
                    warn!(app_id = %app_id, err = %err, "baseline unavailable, assuming 0");
                    0
                }
            },
        };
        report.baseline = Some(baseline);
        let mut current = report.last_count.unwrap_or(baseline);
        report.last_count = Some(current);

        let ceiling = idle_ceiling(goal, self.config.max_idle_minutes_per_card);
        info!(
            app_id = %app_id,
            goal = %goal,
            baseline,
            interval_secs = self.config.interval.as_secs(),
            ceiling_mins = ceiling.as_secs() / 60,
            "idling"
        );

        let outcome = loop {
            if self.stop.sleep(self.clock, self.config.interval) {
                info!(app_id = %app_id, "interrupted while idling");
                break SessionOutcome::Aborted(AbortReason::Interrupted);
            }
            let now = self.clock.now();
            report.polls += 1;
            report.idled = now.saturating_duration_since(started);

            if let Err(err) = presence.keep_alive() {
                warn!(app_id = %app_id, err = %err, "presence lost");
                break SessionOutcome::Aborted(AbortReason::PresenceLost(err.to_string()));
            }

            match self.source.snapshot(app_id, now) {
                Ok(snapshot) => {
                    let count = snapshot.absolute_count;
                    if count > current {
                        info!(app_id = %app_id, from = current, to = count, "card drop detected");
                    } else if count < current {
                        warn!(app_id = %app_id, from = current, to = count, "card count decreased, continuing");
                    } else {
                        debug!(app_id = %app_id, cards = count, "no new cards");
                    }
                    current = count;
                    report.last_count = Some(current);
                }
                Err(ProgressError::PrivateInventory(detail)) => {
                    warn!(app_id = %app_id, detail, "inventory became private");
                    break SessionOutcome::Aborted(AbortReason::PrivateInventory);
                }
                Err(err) => {
                    warn!(app_id = %app_id, err = %err, "progress check failed, retrying next tick");
                }
            }

            if goal.is_met(current, baseline) {
                info!(
                    app_id = %app_id,
                    cards = current,
                    idled_mins = report.idled.as_secs() / 60,
                    "target met"
                );
                break SessionOutcome::Completed;
            }
            if report.idled >= ceiling {
                warn!(
                    app_id = %app_id,
                    idled_mins = report.idled.as_secs() / 60,
                    outstanding = goal.outstanding(current, baseline),
                    "idle time ceiling reached"
                );
                break SessionOutcome::TimedOut;
            }
        };
        // An interrupt lands mid-interval; count the time since the last tick too.
        report.idled = self.clock.now().saturating_duration_since(started);

        self.enter(SessionState::Stopping, app_id);
        if let Err(err) = presence.release() {
            warn!(app_id = %app_id, err = %err, "presence release failed");
        }
        outcome
    }

    fn enter(&mut self, next: SessionState, app_id: AppId) {
        debug!(app_id = %app_id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn finish(&mut self, report: SessionReport, outcome: SessionOutcome) -> SessionReport {
        self.state = match outcome {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::TimedOut => SessionState::TimedOut,
            SessionOutcome::Aborted(_) | SessionOutcome::EnvironmentUnavailable(_) => {
                SessionState::Aborted
            }
        };
        info!(
            app_id = ?report.app_id.map(|id| id.0),
            state = ?self.state,
            outcome = %outcome,
            polls = report.polls,
            "session finished"
        );
        SessionReport { outcome, ..report }
    }
}

fn presence_failure(err: PresenceError) -> SessionOutcome {
    match err {
        PresenceError::EnvironmentUnavailable(detail) => {
            SessionOutcome::EnvironmentUnavailable(detail)
        }
        other => SessionOutcome::Aborted(AbortReason::PresenceUnavailable(other.to_string())),
    }
}

/// Acquire presence, keep it alive for a few seconds, release it.
///
/// A smoke test for the helper and the Steam client.
#[instrument(skip(presence, clock, stop), fields(app_id = %app_id))]
pub fn fast_check<P: PresenceProvider>(
    presence: &P,
    app_id: AppId,
    clock: &dyn Clock,
    stop: &StopSignal,
) -> SessionOutcome {
    if let Err(err) = presence.check_environment() {
        return presence_failure(err);
    }
    let mut session = match presence.acquire(app_id) {
        Ok(session) => ScopedPresence::new(session),
        Err(err) => return presence_failure(err),
    };
    let started: Instant = clock.now();
    for tick in 1..=FAST_CHECK_TICKS {
        if stop.sleep(clock, Duration::from_secs(1)) {
            return SessionOutcome::Aborted(AbortReason::Interrupted);
        }
        if let Err(err) = session.keep_alive() {
            return SessionOutcome::Aborted(AbortReason::PresenceLost(err.to_string()));
        }
        debug!(tick, "fast check keep-alive");
    }
    if let Err(err) = session.release() {
        warn!(err = %err, "presence release failed");
    }
    info!(
        secs = clock.now().saturating_duration_since(started).as_secs(),
        "fast check complete"
    );
    SessionOutcome::Completed
}
