//! Concurrency tests for the nursery binary.
//!
//! These tests verify that multiple processes can safely:
//! - Race to start the single sleep timer
//! - Append to the sleep log simultaneously
//! - Schedule notifications into the shared spool

use assert_cmd::Command;
use std::path::PathBuf;
use std::thread;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("nursery"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn run(data_dir: &PathBuf, args: &[&str]) -> bool {
    cli()
        .arg("--data-dir")
        .arg(data_dir)
        .env("NURSERY_CONFIG", data_dir.join("config.toml"))
        .args(args)
        .output()
        .expect("Failed to run nursery")
        .status
        .success()
}

#[test]
fn test_sequential_sessions_all_logged() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    for _ in 0..5 {
        assert!(run(
            &data_dir,
            &["timer", "start", "--baby-id", "baby_1", "--baby-name", "Mia"]
        ));
        assert!(run(&data_dir, &["timer", "stop"]));
    }

    let log = std::fs::read_to_string(data_dir.join("log/sleep.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 5);
}

#[test]
fn test_concurrent_starts_leave_one_valid_timer() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                let id = format!("baby_{}", i);
                run(
                    &data_dir,
                    &["timer", "start", "--baby-id", &id, "--baby-name", "Mia"],
                )
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    // The winner's record is intact JSON
    let record = std::fs::read_to_string(data_dir.join("timer/active_timer.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&record).unwrap();
    assert_eq!(parsed["baby_name"], "Mia");

    assert!(run(&data_dir, &["timer", "stop"]));
    assert!(!data_dir.join("timer/active_timer.json").exists());
}

#[test]
fn test_concurrent_reminders_keep_spool_valid() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || run(&data_dir, &["reminders", "test"]))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let spool = std::fs::read_to_string(data_dir.join("notifications/spool.json")).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&spool).unwrap();
    assert!(!parsed.is_empty());
    assert!(parsed.len() <= 4);
}
