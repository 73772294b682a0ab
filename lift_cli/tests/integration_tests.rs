//! Integration tests for the lift binary.
//!
//! These tests verify end-to-end behavior including:
//! - Logging sets and finishing sessions
//! - Resuming a session across invocations
//! - Workout editing and CSV import
//! - User-visible rejections

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// The CLI bound to `dir` for both config and data, logged in as ada
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lift"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--user")
        .arg("ada");
    cmd
}

fn log_set(dir: &Path, exercise: &str, set: &str, reps: &str, weight: &str) {
    cli(dir)
        .args(["set", exercise, set, "--reps", reps, "--weight", weight])
        .assert()
        .success();
    cli(dir)
        .args(["done", exercise, set, "--no-rest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("lift"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout session tracker"));
}

#[test]
fn test_default_command_shows_first_workout() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Full Body A"))
        .stdout(predicate::str::contains("Squat"))
        .stdout(predicate::str::contains("Volume: 0"));

    // Defaults were written to the remote store and mirrored to the cache
    let remote = fs::read_to_string(temp_dir.path().join("data/remote.json")).unwrap();
    let tables: serde_json::Value = serde_json::from_str(&remote).unwrap();
    assert_eq!(tables["workouts"].as_array().unwrap().len(), 2);
    assert!(temp_dir
        .path()
        .join("data/cache/lift-workouts-v1-ada.json")
        .exists());
}

#[test]
fn test_logged_sets_survive_between_runs() {
    let temp_dir = setup_test_dir();
    log_set(temp_dir.path(), "squat", "1", "5", "60");

    cli(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] set 1"))
        .stdout(predicate::str::contains("Volume: 300"));
}

#[test]
fn test_finish_records_history_and_resets() {
    let temp_dir = setup_test_dir();
    log_set(temp_dir.path(), "squat", "1", "5", "60");
    log_set(temp_dir.path(), "bench", "1", "8", "50");

    cli(temp_dir.path())
        .arg("finish")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 sets, volume 700"));

    cli(temp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Full Body A"))
        .stdout(predicate::str::contains("Total: 1 sessions, 2 sets, volume 700"));

    cli(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Volume: 0"));

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Squat"))
        .stdout(predicate::str::contains("Bench Press"));
}

#[test]
fn test_finish_without_completed_sets_is_rejected() {
    let temp_dir = setup_test_dir();

    // Done but reps missing: does not qualify
    cli(temp_dir.path())
        .args(["done", "squat", "1", "--no-rest"])
        .assert()
        .success();

    cli(temp_dir.path())
        .arg("finish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot finish session"));

    cli(temp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No completed sessions yet"));

    // The logged state is still there
    cli(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] set 1"));
}

#[test]
fn test_anonymous_user_cannot_finish() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    let anon = || {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lift"));
        cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
            .arg("--data-dir")
            .arg(&data_dir);
        cmd
    };

    anon()
        .args(["set", "squat", "1", "--reps", "5"])
        .assert()
        .success();
    anon().args(["done", "squat", "1", "--no-rest"]).assert().success();

    anon()
        .arg("finish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sign in"));

    assert!(data_dir.join("cache/lift-session-v1-anon.json").exists());
}

#[test]
fn test_stale_set_is_a_noop() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["set", "squat", "42", "--reps", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No set 42"));

    cli(temp_dir.path())
        .args(["done", "nothing", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No set 1 for nothing"));
}

#[test]
fn test_rest_countdown_runs_to_completion() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/lift");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[timer]\nfallback_rest_seconds = 3\ntick_millis = 10\n",
    )
    .unwrap();

    // Zero rest everywhere falls back to the configured 3s
    cli(temp_dir.path())
        .args(["rest", "fullbody-1", "0"])
        .assert()
        .success();

    cli(temp_dir.path())
        .args(["done", "squat", "1"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Rest complete"));
}

#[test]
fn test_switching_workouts_resumes_session() {
    let temp_dir = setup_test_dir();
    log_set(temp_dir.path(), "squat", "1", "5", "60");

    cli(temp_dir.path())
        .args(["select", "fullbody-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started fullbody-2"))
        .stdout(predicate::str::contains("Deadlift"));

    // A different workout's session was cached last, so this rebuilds
    cli(temp_dir.path())
        .args(["select", "fullbody-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started fullbody-1"))
        .stdout(predicate::str::contains("Volume: 0"));

    cli(temp_dir.path())
        .args(["select", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown workout 'missing'"));
}

#[test]
fn test_reset_with_confirmation() {
    let temp_dir = setup_test_dir();
    log_set(temp_dir.path(), "squat", "1", "5", "60");

    cli(temp_dir.path())
        .arg("reset")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset cancelled"));

    cli(temp_dir.path())
        .arg("reset")
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session reset"));

    cli(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Volume: 0"));
}

#[test]
fn test_csv_import() {
    let temp_dir = setup_test_dir();
    let csv_path = temp_dir.path().join("plan.csv");
    fs::write(
        &csv_path,
        "workout_id,workout_name,default_rest_seconds,exercise_id,exercise_name,target_sets,target_reps,default_weight\n\
         push,Push Day,120,bench,Bench Press,4,6,60\n\
         push,Push Day,120,ohp,Overhead Press,3,8,35\n\
         pull,Pull Day,90,row,Barbell Row,3,8,50\n\
         pull,Pull Day,90,curl,Curl,3,12,12\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("import")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 workouts"));

    cli(temp_dir.path())
        .arg("workouts")
        .assert()
        .success()
        .stdout(predicate::str::contains("Push Day (2 exercises, rest 120s)"))
        .stdout(predicate::str::contains("Pull Day (2 exercises, rest 90s)"));
}

#[test]
fn test_malformed_csv_changes_nothing() {
    let temp_dir = setup_test_dir();
    let csv_path = temp_dir.path().join("bad.csv");
    fs::write(
        &csv_path,
        "workout_id,workout_name,default_rest_seconds,exercise_id,exercise_name,target_sets,target_reps,default_weight\n\
         push,Push Day,120,bench,Bench Press,4,6,60\n\
         push,Push Day,120,ohp,,3,8,35\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("import")
        .arg(&csv_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Import failed"))
        .stderr(predicate::str::contains("exercise_name"));

    cli(temp_dir.path())
        .arg("workouts")
        .assert()
        .success()
        .stdout(predicate::str::contains("Push Day").not());
}

#[test]
fn test_workout_editing() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["rename", "fullbody-1", "Monday"])
        .assert()
        .success();
    cli(temp_dir.path())
        .args(["move-exercise", "fullbody-1", "row", "squat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved row"));
    cli(temp_dir.path())
        .args(["remove-exercise", "fullbody-1", "bench"])
        .assert()
        .success();
    cli(temp_dir.path())
        .args(["edit-exercise", "fullbody-1", "squat", "--sets", "2", "--rest", "45"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated squat"));

    cli(temp_dir.path())
        .arg("workouts")
        .assert()
        .success()
        .stdout(predicate::str::contains("Monday (2 exercises"));

    // New sessions follow the edited template
    cli(temp_dir.path())
        .args(["reset", "--yes"])
        .assert()
        .success();
    let output = cli(temp_dir.path()).arg("show").output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let row = stdout.find("Barbell Row").unwrap();
    let squat = stdout.find("Squat").unwrap();
    assert!(row < squat);
    assert!(!stdout.contains("Bench Press"));
}

#[test]
fn test_delete_last_workouts_installs_fallback() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["delete-workout", "fullbody-1", "--yes"])
        .assert()
        .success();
    cli(temp_dir.path())
        .args(["delete-workout", "fullbody-2"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted fullbody-2"));

    cli(temp_dir.path())
        .arg("workouts")
        .assert()
        .success()
        .stdout(predicate::str::contains("* fullbody-a"));
}

#[test]
fn test_stop_without_running_timer() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("No rest timer running"));
}

#[test]
fn test_edit_exercise_rejects_out_of_range_values() {
    let temp_dir = setup_test_dir();

    // A valid name alongside a bad set count changes nothing
    cli(temp_dir.path())
        .args(["edit-exercise", "fullbody-1", "squat", "--name", "Front Squat", "--sets", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("target sets must be at least 1"));
    cli(temp_dir.path())
        .args(["edit-exercise", "fullbody-1", "squat", "--weight=-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("default weight"));

    cli(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Front Squat").not())
        .stderr(predicate::str::contains("Catalog validation errors").not());
}
