//! CLI tests for `yasi idle` and `yasi batch` exit codes.
//!
//! Spawns the yasi binary in a scratch directory with a timed-mode config
//! (no inventory, no store lookups) so nothing touches the network.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use yasi::exit_codes;
use yasi::io::config::{IdleConfig, PresenceConfig, SteamConfig, YasiConfig, write_config};
use yasi::io::init::{InitOptions, YasiPaths, init_yasi};

fn write_timed_config(root: &Path, helper_command: &[&str]) {
    init_yasi(root, &InitOptions { force: false }).expect("init");
    let config = YasiConfig {
        idle: IdleConfig {
            enable_inventory_checking: false,
            ..IdleConfig::default()
        },
        steam: SteamConfig {
            lookup_game_names: false,
            ..SteamConfig::default()
        },
        presence: PresenceConfig {
            helper_command: helper_command.iter().map(|s| s.to_string()).collect(),
            startup_grace_secs: 1,
        },
        ..YasiConfig::default()
    };
    write_config(&YasiPaths::new(root).config_path, &config).expect("write config");
}

fn yasi(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_yasi"))
        .current_dir(root)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("run yasi")
}

#[test]
fn init_then_init_again_fails_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    assert_eq!(yasi(temp.path(), &["init"]).status.code(), Some(exit_codes::OK));
    assert!(temp.path().join(".yasi/config.toml").is_file());
    assert_eq!(
        yasi(temp.path(), &["init"]).status.code(),
        Some(exit_codes::FAILED)
    );
    assert_eq!(
        yasi(temp.path(), &["init", "--force"]).status.code(),
        Some(exit_codes::OK)
    );
}

#[test]
fn inventory_mode_without_steam_id_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    yasi(temp.path(), &["init"]);
    let output = yasi(temp.path(), &["idle", "-a", "220", "-c", "r1"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("steam_id_64"));
}

#[test]
fn missing_presence_helper_means_environment_unavailable() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_timed_config(temp.path(), &["/nonexistent/steam-presence-helper"]);

    let output = yasi(temp.path(), &["idle", "-a", "220", "-c", "r1"]);
    assert_eq!(
        output.status.code(),
        Some(exit_codes::ENVIRONMENT_UNAVAILABLE)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("outcome=environment_unavailable"));
}

#[test]
fn invalid_targets_fail_before_touching_presence() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_timed_config(temp.path(), &["/nonexistent/steam-presence-helper"]);

    for target in ["t3", "x1", "r0"] {
        let output = yasi(temp.path(), &["idle", "-a", "220", "-c", target]);
        assert_eq!(
            output.status.code(),
            Some(exit_codes::FAILED),
            "target {target}"
        );
    }
}

#[test]
fn batch_halts_on_environment_and_leaves_list_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_timed_config(temp.path(), &["/nonexistent/steam-presence-helper"]);
    let original = "220 r1\n# DONE 620 r5\n400 r1\n";
    fs::write(temp.path().join("games.txt"), original).expect("write list");

    for extra in [&[][..], &["--isolate"][..]] {
        let mut args = vec!["batch", "games.txt", "--pause", "0"];
        args.extend_from_slice(extra);
        let output = yasi(temp.path(), &args);
        assert_eq!(
            output.status.code(),
            Some(exit_codes::ENVIRONMENT_UNAVAILABLE),
            "args {args:?}"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("games.txt")).expect("read"),
            original
        );
    }
}

#[cfg(unix)]
#[test]
fn batch_marks_entries_whose_helper_cannot_start() {
    let temp = tempfile::tempdir().expect("tempdir");
    // Passes the `--check` probe, then exits immediately instead of holding presence.
    write_timed_config(temp.path(), &["sh", "-c", "exit 0", "helper"]);
    fs::write(temp.path().join("games.txt"), "220 r1\nportal r1\n400 t2\n").expect("write list");

    let output = yasi(temp.path(), &["batch", "games.txt", "--pause", "0"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        fs::read_to_string(temp.path().join("games.txt")).expect("read"),
        "# FAIL 220 r1\nportal r1\n# FAIL 400 t2\n"
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("done=0 failed=2"));
}
