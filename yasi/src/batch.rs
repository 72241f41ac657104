//! `yasi batch`: resumable runs over a list of games.
//!
//! Lines are visited in order. Entries already marked `# DONE ` / `# FAIL `
//! are skipped; every other entry runs one session and is annotated from its
//! outcome before the next one starts. An unavailable environment or an
//! operator interrupt stops the run and leaves the current entry pending, so
//! rerunning the same command picks up where it stopped.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::{EntryDecision, classify_exit_code, decide};
use crate::core::entry::{BatchLine, GameEntry};
use crate::core::types::{BatchStop, EntryStatus, SessionOutcome};
use crate::idle::{IdleContext, IdleRequest, run_idle};
use crate::io::batch_list::BatchList;
use crate::io::batch_state::{BatchState, load_batch_state, write_batch_state};
use crate::io::clock::Clock;
use crate::io::init::batch_state_path;
use crate::io::presence::PresenceProvider;
use crate::io::process::run_inherited;
use crate::io::signal::StopSignal;
use crate::io::store::GameNames;

/// Runs the session for one batch entry.
pub trait SessionRunner {
    fn run(&mut self, entry: &GameEntry) -> Result<SessionOutcome>;
}

/// Runs sessions inside this process.
pub struct InProcessRunner<'a, P: PresenceProvider> {
    ctx: IdleContext<'a, P>,
    names: GameNames,
    interval: Option<Duration>,
}

impl<'a, P: PresenceProvider> InProcessRunner<'a, P> {
    pub fn new(ctx: IdleContext<'a, P>, interval: Option<Duration>) -> Self {
        let names = GameNames::new(&ctx.config.steam);
        Self {
            ctx,
            names,
            interval,
        }
    }
}

impl<P: PresenceProvider> SessionRunner for InProcessRunner<'_, P> {
    fn run(&mut self, entry: &GameEntry) -> Result<SessionOutcome> {
        let request = IdleRequest {
            identifier: entry.raw_identifier.clone(),
            target: entry.target_spec.clone(),
            interval: self.interval,
            fast: false,
        };
        run_idle(&self.ctx, &mut self.names, &request).map(|report| report.outcome)
    }
}

/// Runs each session as a child `yasi idle` process and classifies its exit code.
#[derive(Debug, Clone)]
pub struct ChildProcessRunner {
    exe: PathBuf,
    workdir: PathBuf,
    config_path: Option<PathBuf>,
    interval: Option<Duration>,
}

impl ChildProcessRunner {
    pub fn new(
        exe: PathBuf,
        workdir: PathBuf,
        config_path: Option<PathBuf>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            exe,
            workdir,
            config_path,
            interval,
        }
    }

    /// Runner re-invoking the current executable.
    pub fn current_exe(
        workdir: PathBuf,
        config_path: Option<PathBuf>,
        interval: Option<Duration>,
    ) -> Result<Self> {
        let exe = std::env::current_exe().context("locate current executable")?;
        Ok(Self::new(exe, workdir, config_path, interval))
    }

    fn command(&self, entry: &GameEntry) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.current_dir(&self.workdir)
            .arg("idle")
            .arg("--app")
            .arg(&entry.raw_identifier)
            .arg("--cards")
            .arg(&entry.target_spec);
        if let Some(config) = &self.config_path {
            cmd.arg("--config").arg(config);
        }
        if let Some(interval) = self.interval {
            cmd.arg("--interval").arg(interval.as_secs().to_string());
        }
        cmd
    }
}

impl SessionRunner for ChildProcessRunner {
    #[instrument(skip_all, fields(app_id = %entry.app_id))]
    fn run(&mut self, entry: &GameEntry) -> Result<SessionOutcome> {
        let code = run_inherited(self.command(entry))
            .with_context(|| format!("run idle process for {}", entry.body()))?;
        let outcome = classify_exit_code(code);
        debug!(exit_code = ?code, outcome = outcome.label(), "idle process finished");
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pause before every processed entry except the first, whether the
    /// previous one completed or failed.
    pub pause: Duration,
}

/// Summary of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries a session ran for.
    pub processed: u32,
    pub done: u32,
    pub failed: u32,
    /// Entries already annotated before this run.
    pub skipped: u32,
    /// Lines skipped because no entry could be parsed from them.
    pub malformed: u32,
    /// Results recovered from the state table at startup.
    pub reconciled: u32,
    pub stop: BatchStop,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            processed: 0,
            done: 0,
            failed: 0,
            skipped: 0,
            malformed: 0,
            reconciled: 0,
            stop: BatchStop::Finished,
        }
    }
}

/// One finished entry, passed to the `on_entry` callback.
#[derive(Debug)]
pub struct EntryResult<'a> {
    /// 1-based line number in the list.
    pub line: usize,
    pub entry: &'a GameEntry,
    pub outcome: &'a SessionOutcome,
}

/// Process `list_path` until every line is visited or the run must stop.
#[instrument(skip(runner, clock, stop, on_entry), fields(list = %list_path.display()))]
pub fn run_batch<R: SessionRunner, F: FnMut(&EntryResult<'_>)>(
    list_path: &Path,
    runner: &mut R,
    clock: &dyn Clock,
    stop: &StopSignal,
    options: &BatchOptions,
    mut on_entry: F,
) -> Result<BatchReport> {
    let mut list = BatchList::load(list_path)?;
    let state_path = batch_state_path(list_path);
    let mut state = load_batch_state(&state_path)?;
    let mut report = BatchReport::new();

    report.reconciled = reconcile(&mut list, &mut state, &state_path)?;

    for index in 0..list.len() {
        let line_no = index + 1;
        let entry = match list.parse(index) {
            None | Some(BatchLine::Blank | BatchLine::Comment) => continue,
            Some(BatchLine::Malformed(err)) => {
                warn!(line = line_no, err = %err, "skipping malformed batch line");
                report.malformed += 1;
                continue;
            }
            Some(BatchLine::Entry(entry)) if entry.status != EntryStatus::Pending => {
                debug!(line = line_no, entry = %entry.body(), status = ?entry.status, "already annotated");
                report.skipped += 1;
                continue;
            }
            Some(BatchLine::Entry(entry)) => entry,
        };

        if stop.is_raised() {
            report.stop = BatchStop::Interrupted;
            break;
        }
        if report.processed > 0 && !options.pause.is_zero() {
            info!(secs = options.pause.as_secs(), "pausing before next game");
            if stop.sleep(clock, options.pause) {
                report.stop = BatchStop::Interrupted;
                break;
            }
        }

        report.processed += 1;
        info!(line = line_no, app_id = %entry.app_id, target = %entry.target_spec, "starting batch entry");
        let outcome = runner.run(&entry)?;
        on_entry(&EntryResult {
            line: line_no,
            entry: &entry,
            outcome: &outcome,
        });

        match decide(&outcome) {
            EntryDecision::Mark(status) => {
                record_result(&mut list, &mut state, &state_path, index, &entry, status, &outcome)?;
                match status {
                    EntryStatus::Done => report.done += 1,
                    EntryStatus::Failed => report.failed += 1,
                    EntryStatus::Pending => {}
                }
            }
            EntryDecision::Halt(reason) => {
                warn!(line = line_no, app_id = %entry.app_id, outcome = %outcome, "stopping batch; entry left pending");
                report.stop = reason;
                break;
            }
        }
    }

    info!(
        processed = report.processed,
        done = report.done,
        failed = report.failed,
        skipped = report.skipped,
        stop = ?report.stop,
        "batch finished"
    );
    Ok(report)
}

/// Journal the result, then annotate the list, then flag the journal entry rendered.
fn record_result(
    list: &mut BatchList,
    state: &mut BatchState,
    state_path: &Path,
    index: usize,
    entry: &GameEntry,
    status: EntryStatus,
    outcome: &SessionOutcome,
) -> Result<()> {
    let key = entry.key();
    state.record(&key, status, outcome.label(), Utc::now());
    write_batch_state(state_path, state)?;

    list.annotate(index, status)?;
    list.save()?;

    state.mark_rendered(&key);
    write_batch_state(state_path, state)?;
    debug!(key = %key, ?status, "batch entry annotated");
    Ok(())
}

/// Render results that reached the state table but not the list.
fn reconcile(list: &mut BatchList, state: &mut BatchState, state_path: &Path) -> Result<u32> {
    let pending: Vec<(String, EntryStatus)> = state
        .unrendered()
        .map(|(key, record)| (key.to_string(), record.status))
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let mut rendered = 0u32;
    for (key, status) in &pending {
        let line = (0..list.len()).find(|&index| {
            matches!(
                list.parse(index),
                Some(BatchLine::Entry(entry))
                    if entry.status == EntryStatus::Pending && entry.key() == *key
            )
        });
        match line {
            Some(index) => {
                list.annotate(index, *status)?;
                rendered += 1;
                info!(line = index + 1, key = %key, ?status, "recovered result from batch state");
            }
            None => debug!(key = %key, "journaled result has no pending line"),
        }
    }
    if rendered > 0 {
        list.save()?;
    }
    for (key, _) in &pending {
        state.mark_rendered(key);
    }
    write_batch_state(state_path, state)?;
    Ok(rendered)
}
