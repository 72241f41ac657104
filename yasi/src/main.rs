//! Steam trading-card idler.
//!
//! `yasi idle` keeps one game "running" until a card target is met or its idle
//! ceiling runs out. `yasi batch` does the same for every pending line of a
//! list file and marks each line `# DONE ` or `# FAIL ` as it goes, so an
//! interrupted batch resumes where it stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use yasi::batch::{
    BatchOptions, BatchReport, ChildProcessRunner, EntryResult, InProcessRunner, SessionRunner,
    run_batch,
};
use yasi::core::classifier::exit_code_for;
use yasi::core::types::BatchStop;
use yasi::exit_codes;
use yasi::idle::{IdleContext, IdleRequest, run_idle};
use yasi::io::clock::SystemClock;
use yasi::io::config::{YasiConfig, load_config};
use yasi::io::init::{InitOptions, YasiPaths, init_yasi};
use yasi::io::presence::HelperPresenceProvider;
use yasi::io::signal::StopSignal;
use yasi::io::store::GameNames;
use yasi::logging;

#[derive(Parser)]
#[command(
    name = "yasi",
    version,
    about = "Idle Steam games until their trading cards drop"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.yasi/` with a default config.
    Init {
        /// Overwrite an existing config with defaults.
        #[arg(short, long)]
        force: bool,
    },
    /// Idle one game until its card target is met.
    Idle {
        /// AppID, or a store / gamecards URL containing one.
        #[arg(short, long)]
        app: String,
        /// Card target: `tN` (total owned) or `rN` (N more drops).
        #[arg(short, long, required_unless_present = "fast")]
        cards: Option<String>,
        /// Seconds between progress checks (overrides the config).
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Only check that presence works: hold the game for 5 seconds.
        #[arg(short, long)]
        fast: bool,
        /// Config file (default: `.yasi/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Idle every pending game in a list file, marking lines as they finish.
    Batch {
        /// List file with `<identifier> <target>` lines.
        list: PathBuf,
        /// Seconds to wait between games (overrides the config).
        #[arg(long)]
        pause: Option<u64>,
        /// Seconds between progress checks (overrides the config).
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Run each game as a separate `yasi idle` process.
        #[arg(long)]
        isolate: bool,
        /// Config file (default: `.yasi/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Idle {
            app,
            cards,
            interval,
            fast,
            config,
        } => {
            let request = IdleRequest {
                identifier: app,
                target: cards.unwrap_or_default(),
                interval: interval.map(Duration::from_secs),
                fast,
            };
            cmd_idle(&root, config, &request)
        }
        Command::Batch {
            list,
            pause,
            interval,
            isolate,
            config,
        } => cmd_batch(
            &root,
            config,
            &list,
            pause.map(Duration::from_secs),
            interval.map(Duration::from_secs),
            isolate,
        ),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_yasi(root, &InitOptions { force })?;
    println!(
        "init: wrote {} (set steam.steam_id_64 before idling)",
        paths.config_path.display()
    );
    Ok(exit_codes::OK)
}

fn load(root: &Path, config_path: Option<PathBuf>) -> Result<(YasiPaths, YasiConfig)> {
    let paths = YasiPaths::new(root).with_config(config_path);
    let config = load_config(&paths.config_path)?;
    Ok((paths, config))
}

fn cmd_idle(root: &Path, config_path: Option<PathBuf>, request: &IdleRequest) -> Result<i32> {
    let (paths, config) = load(root, config_path)?;
    let stop = StopSignal::new();
    stop.install_ctrlc()?;
    let presence = HelperPresenceProvider::new(&config.presence, &paths.presence_dir);
    let ctx = IdleContext {
        paths: &paths,
        config: &config,
        presence: &presence,
        clock: &SystemClock,
        stop: &stop,
    };
    let mut names = GameNames::new(&config.steam);

    let report = run_idle(&ctx, &mut names, request)?;
    let app = report
        .app_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| request.identifier.clone());
    println!(
        "idle: app={} outcome={} ({})",
        app,
        report.outcome.label(),
        report.outcome
    );
    Ok(exit_code_for(&report.outcome))
}

fn cmd_batch(
    root: &Path,
    config_path: Option<PathBuf>,
    list: &Path,
    pause: Option<Duration>,
    interval: Option<Duration>,
    isolate: bool,
) -> Result<i32> {
    let (paths, config) = load(root, config_path.clone())?;
    let stop = StopSignal::new();
    stop.install_ctrlc()?;
    let options = BatchOptions {
        pause: pause.unwrap_or(Duration::from_secs(
            config.batch.pause_between_games_seconds,
        )),
    };

    let report = if isolate {
        let mut runner = ChildProcessRunner::current_exe(root.to_path_buf(), config_path, interval)?;
        batch_with(list, &mut runner, &stop, &options)?
    } else {
        let presence = HelperPresenceProvider::new(&config.presence, &paths.presence_dir);
        let ctx = IdleContext {
            paths: &paths,
            config: &config,
            presence: &presence,
            clock: &SystemClock,
            stop: &stop,
        };
        let mut runner = InProcessRunner::new(ctx, interval);
        batch_with(list, &mut runner, &stop, &options)?
    };

    println!(
        "batch: processed={} done={} failed={} skipped={} malformed={}",
        report.processed, report.done, report.failed, report.skipped, report.malformed
    );
    Ok(match report.stop {
        BatchStop::Finished => exit_codes::OK,
        BatchStop::EnvironmentUnavailable(detail) => {
            eprintln!("batch stopped: environment unavailable ({detail}); rerun to resume");
            exit_codes::ENVIRONMENT_UNAVAILABLE
        }
        BatchStop::Interrupted => {
            eprintln!("batch stopped: interrupted; rerun to resume");
            exit_codes::INTERRUPTED
        }
    })
}

fn batch_with<R: SessionRunner>(
    list: &Path,
    runner: &mut R,
    stop: &StopSignal,
    options: &BatchOptions,
) -> Result<BatchReport> {
    run_batch(list, runner, &SystemClock, stop, options, |result: &EntryResult<'_>| {
        println!(
            "batch: line {} app={} target={} outcome={}",
            result.line,
            result.entry.app_id,
            result.entry.target_spec,
            result.outcome.label()
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["yasi", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_idle() {
        let cli = Cli::parse_from(["yasi", "idle", "-a", "220", "-c", "r2", "-i", "60"]);
        let Command::Idle {
            app,
            cards,
            interval,
            fast,
            config,
        } = cli.command
        else {
            panic!("expected idle");
        };
        assert_eq!(app, "220");
        assert_eq!(cards.as_deref(), Some("r2"));
        assert_eq!(interval, Some(60));
        assert!(!fast);
        assert!(config.is_none());
    }

    #[test]
    fn idle_requires_cards_unless_fast() {
        assert!(Cli::try_parse_from(["yasi", "idle", "-a", "220"]).is_err());
        let cli = Cli::parse_from(["yasi", "idle", "-a", "220", "--fast"]);
        assert!(matches!(cli.command, Command::Idle { fast: true, cards: None, .. }));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["yasi", "idle", "-a", "220", "-c", "r1", "-i", "0"]).is_err());
        assert!(Cli::try_parse_from(["yasi", "batch", "games.txt", "--interval", "0"]).is_err());
        let cli = Cli::parse_from(["yasi", "batch", "games.txt", "-i", "1", "--pause", "0"]);
        assert!(matches!(
            cli.command,
            Command::Batch {
                interval: Some(1),
                pause: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn parse_batch() {
        let cli = Cli::parse_from([
            "yasi", "batch", "games.txt", "--pause", "0", "--isolate", "--config", "alt.toml",
        ]);
        let Command::Batch {
            list,
            pause,
            isolate,
            config,
            ..
        } = cli.command
        else {
            panic!("expected batch");
        };
        assert_eq!(list, PathBuf::from("games.txt"));
        assert_eq!(pause, Some(0));
        assert!(isolate);
        assert_eq!(config, Some(PathBuf::from("alt.toml")));
    }
}
