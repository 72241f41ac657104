//! Game presence: making Steam believe a game is running.
//!
//! The capability itself lives in an external helper process that talks to
//! the local Steam client. This module owns its lifecycle: probe, launch with
//! the `steam_appid.txt` marker, liveness checks, and teardown.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::AppId;
use crate::exit_codes;
use crate::io::config::PresenceConfig;
use crate::io::process::run_command_with_timeout;

/// Marker file read by the Steam API to pick the game identity.
pub const STEAM_APPID_FILE: &str = "steam_appid.txt";

const CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const CHECK_OUTPUT_LIMIT: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    /// The Steam client (or the helper itself) is not available on this machine.
    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),
    #[error("could not start game presence: {0}")]
    Unavailable(String),
    #[error("game presence ended unexpectedly: {0}")]
    Lost(String),
    #[error("could not release game presence: {0}")]
    Release(String),
}

/// Source of game-presence sessions.
pub trait PresenceProvider {
    type Session: GamePresenceSession;

    /// Probe that the idling environment is usable before touching anything.
    fn check_environment(&self) -> Result<(), PresenceError>;

    /// Start reporting `app_id` as running.
    fn acquire(&self, app_id: AppId) -> Result<Self::Session, PresenceError>;
}

/// A live presence session. `release` must be idempotent.
pub trait GamePresenceSession {
    fn keep_alive(&mut self) -> Result<(), PresenceError>;
    fn release(&mut self) -> Result<(), PresenceError>;
}

/// Presence backed by `[presence].helper_command`.
#[derive(Debug, Clone)]
pub struct HelperPresenceProvider {
    command: Vec<String>,
    marker_dir: PathBuf,
    startup_grace: Duration,
}

impl HelperPresenceProvider {
    pub fn new(config: &PresenceConfig, marker_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: config.helper_command.clone(),
            marker_dir: marker_dir.into(),
            startup_grace: Duration::from_secs(config.startup_grace_secs),
        }
    }

    fn base_command(&self) -> Result<Command, PresenceError> {
        let (program, args) = self.command.split_first().ok_or_else(|| {
            PresenceError::EnvironmentUnavailable("presence helper command is empty".to_string())
        })?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }

    fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }
}

impl PresenceProvider for HelperPresenceProvider {
    type Session = HelperPresenceSession;

    #[instrument(skip(self), fields(helper = self.program()))]
    fn check_environment(&self) -> Result<(), PresenceError> {
        let mut cmd = self.base_command()?;
        cmd.arg("--check");
        let output = run_command_with_timeout(cmd, CHECK_TIMEOUT, CHECK_OUTPUT_LIMIT)
            .map_err(|err| {
                PresenceError::EnvironmentUnavailable(format!(
                    "presence helper `{}` could not run: {err:#}",
                    self.program()
                ))
            })?;
        if output.timed_out {
            return Err(PresenceError::EnvironmentUnavailable(format!(
                "presence helper check did not finish within {}s",
                CHECK_TIMEOUT.as_secs()
            )));
        }
        if output.status.success() {
            debug!("presence environment ready");
            return Ok(());
        }
        let detail = output
            .headline()
            .unwrap_or_else(|| format!("helper check exited with {}", output.status));
        if output.status.code() == Some(exit_codes::ENVIRONMENT_UNAVAILABLE) {
            return Err(PresenceError::EnvironmentUnavailable(format!(
                "Steam client not running: {detail}"
            )));
        }
        Err(PresenceError::EnvironmentUnavailable(detail))
    }

    #[instrument(skip(self), fields(app_id = %app_id, helper = self.program()))]
    fn acquire(&self, app_id: AppId) -> Result<HelperPresenceSession, PresenceError> {
        let marker = write_marker(&self.marker_dir, app_id)?;

        let mut cmd = self.base_command()?;
        cmd.arg(app_id.to_string())
            .current_dir(&self.marker_dir)
            .env("SteamAppId", app_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                remove_marker(&marker);
                return Err(PresenceError::EnvironmentUnavailable(format!(
                    "spawn presence helper `{}`: {err}",
                    self.program()
                )));
            }
        };

        match child.wait_timeout(self.startup_grace) {
            Ok(None) => {}
            Ok(Some(status)) => {
                remove_marker(&marker);
                if status.code() == Some(exit_codes::ENVIRONMENT_UNAVAILABLE) {
                    return Err(PresenceError::EnvironmentUnavailable(
                        "presence helper could not connect to the Steam client".to_string(),
                    ));
                }
                return Err(PresenceError::Unavailable(format!(
                    "presence helper exited during startup ({status})"
                )));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                remove_marker(&marker);
                return Err(PresenceError::Unavailable(format!(
                    "wait for presence helper: {err}"
                )));
            }
        }

        info!(pid = child.id(), "game presence acquired");
        Ok(HelperPresenceSession {
            app_id,
            child,
            marker,
            released: false,
        })
    }
}

/// Running helper process for one game.
#[derive(Debug)]
pub struct HelperPresenceSession {
    app_id: AppId,
    child: Child,
    marker: PathBuf,
    released: bool,
}

impl GamePresenceSession for HelperPresenceSession {
    fn keep_alive(&mut self) -> Result<(), PresenceError> {
        if self.released {
            return Err(PresenceError::Lost("session already released".to_string()));
        }
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(PresenceError::Lost(format!(
                "presence helper exited ({status})"
            ))),
            Err(err) => Err(PresenceError::Lost(format!(
                "could not poll presence helper: {err}"
            ))),
        }
    }

    #[instrument(skip(self), fields(app_id = %self.app_id))]
    fn release(&mut self) -> Result<(), PresenceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let result = match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "presence helper already exited");
                Ok(())
            }
            _ => self
                .child
                .kill()
                .and_then(|()| self.child.wait().map(|_| ()))
                .map_err(|err| PresenceError::Release(format!("stop presence helper: {err}"))),
        };
        remove_marker(&self.marker);
        info!("game presence released");
        result
    }
}

impl Drop for HelperPresenceSession {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(err = %err, "presence release on drop failed");
        }
    }
}

fn write_marker(dir: &Path, app_id: AppId) -> Result<PathBuf, PresenceError> {
    let marker = dir.join(STEAM_APPID_FILE);
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&marker, format!("{app_id}\n")))
        .map_err(|err| {
            PresenceError::Unavailable(format!("write {}: {err}", marker.display()))
        })?;
    debug!(path = %marker.display(), "presence marker written");
    Ok(marker)
}

fn remove_marker(marker: &Path) {
    match fs::remove_file(marker) {
        Ok(()) => debug!(path = %marker.display(), "presence marker removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %marker.display(), err = %err, "could not remove presence marker"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn provider(script: &str, dir: &Path, grace_secs: u64) -> HelperPresenceProvider {
        let config = PresenceConfig {
            helper_command: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "helper".to_string(),
            ],
            startup_grace_secs: grace_secs,
        };
        HelperPresenceProvider::new(&config, dir)
    }

    #[test]
    fn check_passes_when_helper_exits_zero() {
        let temp = tempfile::tempdir().expect("tempdir");
        provider("exit 0", temp.path(), 1)
            .check_environment()
            .expect("check");
    }

    #[test]
    fn check_exit_two_means_steam_not_running() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = provider("echo 'no client' >&2; exit 2", temp.path(), 1)
            .check_environment()
            .unwrap_err();
        assert!(matches!(err, PresenceError::EnvironmentUnavailable(ref msg) if msg.contains("no client")));
    }

    #[test]
    fn missing_helper_is_environment_unavailable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = PresenceConfig {
            helper_command: vec!["/nonexistent/steam-presence-helper".to_string()],
            startup_grace_secs: 1,
        };
        let provider = HelperPresenceProvider::new(&config, temp.path());
        assert!(matches!(
            provider.check_environment(),
            Err(PresenceError::EnvironmentUnavailable(_))
        ));
        assert!(matches!(
            provider.acquire(AppId(220)),
            Err(PresenceError::EnvironmentUnavailable(_))
        ));
        assert!(!temp.path().join(STEAM_APPID_FILE).exists());
    }

    #[test]
    fn acquire_writes_marker_and_release_cleans_up() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = provider("test \"$1\" = 220 && sleep 30", temp.path(), 1);
        let mut session = provider.acquire(AppId(220)).expect("acquire");
        let marker = temp.path().join(STEAM_APPID_FILE);
        assert_eq!(fs::read_to_string(&marker).expect("marker"), "220\n");

        session.keep_alive().expect("alive");
        session.release().expect("release");
        assert!(!marker.exists());
        session.release().expect("second release is a no-op");
        assert!(session.keep_alive().is_err());
    }

    #[test]
    fn helper_exiting_during_startup_fails_acquisition() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = provider("exit 2", temp.path(), 2)
            .acquire(AppId(220))
            .unwrap_err();
        assert!(matches!(err, PresenceError::EnvironmentUnavailable(_)), "{err}");

        let err = provider("exit 1", temp.path(), 2)
            .acquire(AppId(220))
            .unwrap_err();
        assert!(matches!(err, PresenceError::Unavailable(_)), "{err}");
        assert!(!temp.path().join(STEAM_APPID_FILE).exists());
    }

    #[test]
    fn keep_alive_detects_exited_helper() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = provider("sleep 0.2", temp.path(), 0)
            .acquire(AppId(220))
            .expect("acquire");
        std::thread::sleep(Duration::from_secs(1));
        assert!(matches!(session.keep_alive(), Err(PresenceError::Lost(_))));
        session.release().expect("release");
    }
}
