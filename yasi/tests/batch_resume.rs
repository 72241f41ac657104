//! Resumable batch runs driven by a scripted session runner.
//!
//! Exercises skip, halt and resume behavior across repeated `run_batch`
//! calls on the same list file.

use std::fs;
use std::time::Duration;

use yasi::batch::{BatchOptions, run_batch};
use yasi::core::types::{AbortReason, BatchStop, SessionOutcome};
use yasi::io::init::batch_state_path;
use yasi::io::signal::StopSignal;
use yasi::test_support::{FakeClock, ScriptedSessionRunner, write_list};

fn no_pause() -> BatchOptions {
    BatchOptions {
        pause: Duration::ZERO,
    }
}

#[test]
fn annotated_entries_are_skipped_and_others_run_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let list = write_list(temp.path(), "220 r2\n# DONE 620 t5\n400 r1\n");
    let mut runner = ScriptedSessionRunner::new(vec![
        SessionOutcome::Completed,
        SessionOutcome::Completed,
    ]);

    let report = run_batch(
        &list,
        &mut runner,
        &FakeClock::new(),
        &StopSignal::new(),
        &no_pause(),
        |_| {},
    )
    .expect("batch");

    assert_eq!(runner.ran_app_ids(), vec![220, 400]);
    assert_eq!(report.stop, BatchStop::Finished);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        fs::read_to_string(&list).expect("read"),
        "# DONE 220 r2\n# DONE 620 t5\n# DONE 400 r1\n"
    );
}

#[test]
fn environment_unavailable_halts_and_a_rerun_resumes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let list = write_list(temp.path(), "220 r1\n400 r1\n570 r1\n");

    let mut first = ScriptedSessionRunner::new(vec![
        SessionOutcome::TimedOut,
        SessionOutcome::EnvironmentUnavailable("Steam client not running".to_string()),
    ]);
    let report = run_batch(
        &list,
        &mut first,
        &FakeClock::new(),
        &StopSignal::new(),
        &no_pause(),
        |_| {},
    )
    .expect("first run");

    assert_eq!(
        report.stop,
        BatchStop::EnvironmentUnavailable("Steam client not running".to_string())
    );
    assert_eq!(first.ran_app_ids(), vec![220, 400]);
    assert_eq!(
        fs::read_to_string(&list).expect("read"),
        "# FAIL 220 r1\n400 r1\n570 r1\n"
    );

    let mut second = ScriptedSessionRunner::new(vec![
        SessionOutcome::Completed,
        SessionOutcome::Aborted(AbortReason::PrivateInventory),
    ]);
    let report = run_batch(
        &list,
        &mut second,
        &FakeClock::new(),
        &StopSignal::new(),
        &no_pause(),
        |_| {},
    )
    .expect("second run");

    assert_eq!(report.stop, BatchStop::Finished);
    assert_eq!(second.ran_app_ids(), vec![400, 570]);
    assert_eq!(
        fs::read_to_string(&list).expect("read"),
        "# FAIL 220 r1\n# DONE 400 r1\n# FAIL 570 r1\n"
    );

    let mut third = ScriptedSessionRunner::new(vec![]);
    let report = run_batch(
        &list,
        &mut third,
        &FakeClock::new(),
        &StopSignal::new(),
        &no_pause(),
        |_| {},
    )
    .expect("third run");
    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 3);
    assert!(third.ran.is_empty());
}

#[test]
fn state_table_tracks_every_annotation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let list = write_list(temp.path(), "220 r1\nhttps://store.steampowered.com/app/400/ R2\n");
    let mut runner = ScriptedSessionRunner::new(vec![
        SessionOutcome::Completed,
        SessionOutcome::TimedOut,
    ]);

    run_batch(
        &list,
        &mut runner,
        &FakeClock::new(),
        &StopSignal::new(),
        &no_pause(),
        |_| {},
    )
    .expect("batch");

    let raw = fs::read_to_string(batch_state_path(&list)).expect("state file");
    let state: serde_json::Value = serde_json::from_str(&raw).expect("state json");
    assert_eq!(state["entries"]["220:r1"]["status"], "done");
    assert_eq!(state["entries"]["400:r2"]["status"], "failed");
    assert_eq!(state["entries"]["400:r2"]["outcome"], "timed_out");
    assert_eq!(state["entries"]["400:r2"]["rendered"], true);
}
