//! `yasi idle`: one game, one session.
//!
//! Wraps the session controller with everything around it: picking the
//! progress source from config, the display name, the fast presence check,
//! and timed-mode carry-over between sessions.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::core::budget::seconds_into_current_card;
use crate::core::entry::resolve_app_id;
use crate::core::types::{AbortReason, AppId, SessionOutcome, SourceKind};
use crate::io::clock::Clock;
use crate::io::config::YasiConfig;
use crate::io::idle_state::{IdleCarryOver, clear_carry_over, load_carry_over, save_carry_over};
use crate::io::init::YasiPaths;
use crate::io::inventory::{InventoryClient, InventorySnapshotSource};
use crate::io::presence::PresenceProvider;
use crate::io::progress::{ElapsedTimeEstimateSource, ProgressSource};
use crate::io::signal::StopSignal;
use crate::io::store::GameNames;
use crate::session::{SessionConfig, SessionController, SessionReport, fast_check};

/// Shared collaborators for running idle sessions.
pub struct IdleContext<'a, P: PresenceProvider> {
    pub paths: &'a YasiPaths,
    pub config: &'a YasiConfig,
    pub presence: &'a P,
    pub clock: &'a dyn Clock,
    pub stop: &'a StopSignal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleRequest {
    pub identifier: String,
    pub target: String,
    /// Overrides `idle.default_monitoring_interval_seconds`.
    pub interval: Option<Duration>,
    /// Only prove presence works; no target, no polling.
    pub fast: bool,
}

impl<P: PresenceProvider> IdleContext<'_, P> {
    fn session_config(&self, request: &IdleRequest) -> SessionConfig {
        SessionConfig {
            interval: request.interval.unwrap_or_else(|| self.config.idle.interval()),
            max_idle_minutes_per_card: self.config.idle.max_idle_minutes_per_card,
        }
    }
}

/// Run one idle request to a terminal outcome.
///
/// Errors are reserved for local failures (e.g. building the HTTP client);
/// everything Steam-related is reported through the outcome.
pub fn run_idle<P: PresenceProvider>(
    ctx: &IdleContext<'_, P>,
    names: &mut GameNames,
    request: &IdleRequest,
) -> Result<SessionReport> {
    let app_id = resolve_app_id(&request.identifier);
    if let Some(app_id) = app_id {
        info!(app_id = %app_id, game = %names.name(app_id), target = %request.target, "processing game");
    }

    if request.fast {
        let Some(app_id) = app_id else {
            return Ok(SessionReport::for_outcome(
                None,
                SessionOutcome::Aborted(AbortReason::InvalidIdentifier(format!(
                    "no AppID found in '{}'",
                    request.identifier
                ))),
            ));
        };
        let outcome = fast_check(ctx.presence, app_id, ctx.clock, ctx.stop);
        return Ok(SessionReport::for_outcome(Some(app_id), outcome));
    }

    match ctx.config.idle.source_kind() {
        SourceKind::Inventory => {
            let client = InventoryClient::new(&ctx.config.steam)?;
            let mut source = InventorySnapshotSource::new(client, ctx.config.steam.steam_id_64.as_str());
            Ok(run_session(ctx, &mut source, request, &request.target))
        }
        SourceKind::ElapsedTime => Ok(run_timed(ctx, app_id, request)),
    }
}

fn run_session<P: PresenceProvider>(
    ctx: &IdleContext<'_, P>,
    source: &mut dyn ProgressSource,
    request: &IdleRequest,
    target: &str,
) -> SessionReport {
    SessionController::new(
        ctx.presence,
        source,
        ctx.clock,
        ctx.stop,
        ctx.session_config(request),
    )
    .run(&request.identifier, target)
}

/// Timed session with carry-over of partial progress.
fn run_timed<P: PresenceProvider>(
    ctx: &IdleContext<'_, P>,
    app_id: Option<AppId>,
    request: &IdleRequest,
) -> SessionReport {
    let minutes_per_card = ctx.config.idle.expected_minutes_per_card();
    let state_path = &ctx.paths.idle_state_path;

    let saved = app_id.and_then(|app_id| load_carry_over(state_path, app_id));
    let mut target = request.target.clone();
    let mut carried = Duration::ZERO;
    if let Some(saved) = &saved {
        if !saved.target.eq_ignore_ascii_case(&request.target) {
            warn!(
                requested = %request.target,
                saved = %saved.target,
                path = %state_path.display(),
                "saved progress uses a different target and takes priority; delete the state file to start fresh"
            );
            target = saved.target.clone();
        }
        carried = Duration::from_secs(saved.seconds_into_current_card);
        info!(
            app_id = %saved.app_id,
            carried_secs = saved.seconds_into_current_card,
            "resuming saved progress toward next card"
        );
    }

    let mut source = ElapsedTimeEstimateSource::new(minutes_per_card, carried);
    let report = run_session(ctx, &mut source, request, &target);

    let Some(app_id) = report.app_id else {
        return report;
    };
    match &report.outcome {
        SessionOutcome::Completed => {
            if let Err(err) = clear_carry_over(state_path) {
                warn!(err = %format!("{err:#}"), "could not clear idle state");
            }
        }
        SessionOutcome::TimedOut | SessionOutcome::Aborted(AbortReason::Interrupted) => {
            let outstanding = report.outstanding().unwrap_or(0);
            let result = if outstanding > 0 {
                let state = IdleCarryOver {
                    app_id,
                    target: format!("r{outstanding}"),
                    seconds_into_current_card: seconds_into_current_card(
                        carried + report.idled,
                        minutes_per_card,
                    ),
                    saved_at: Utc::now(),
                };
                info!(
                    target = %state.target,
                    secs = state.seconds_into_current_card,
                    "saving idle progress"
                );
                save_carry_over(state_path, &state)
            } else {
                clear_carry_over(state_path)
            };
            if let Err(err) = result {
                warn!(err = %format!("{err:#}"), "could not update idle state");
            }
        }
        _ => {}
    }
    report
}
