//! Helpers for running child processes: bounded probes and inherited-stdio runs.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    /// First non-empty line of stderr, falling back to stdout.
    pub fn headline(&self) -> Option<String> {
        [&self.stderr, &self.stdout].into_iter().find_map(|buf| {
            String::from_utf8_lossy(buf)
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Run a command to completion with the parent's stdio.
///
/// Returns the exit code, or `None` when the child was killed by a signal.
#[instrument(skip_all, fields(program = ?cmd.get_program()))]
pub fn run_inherited(mut cmd: Command) -> Result<Option<i32>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    debug!("spawning child process");
    let status = cmd
        .spawn()
        .context("spawn command")?
        .wait()
        .context("wait for command")?;
    debug!(exit_code = ?status.code(), "command finished");
    Ok(status.code())
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
    }

    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_exit_code_and_headline() {
        let output = run_command_with_timeout(
            sh("echo; echo 'steam not running' >&2; exit 2"),
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(2));
        assert!(!output.timed_out);
        assert_eq!(output.headline().as_deref(), Some("steam not running"));
    }

    #[test]
    fn kills_commands_that_overrun() {
        let output =
            run_command_with_timeout(sh("sleep 30"), Duration::from_millis(200), 1024)
                .expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn bounds_captured_output() {
        let output = run_command_with_timeout(
            sh("printf 'abcdefghij'"),
            Duration::from_secs(10),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, b"abcd");
    }

    #[test]
    fn inherited_run_reports_exit_code() {
        assert_eq!(run_inherited(sh("exit 3")).expect("run"), Some(3));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_command_with_timeout(
            Command::new("/nonexistent/yasi-helper"),
            Duration::from_secs(1),
            64,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
