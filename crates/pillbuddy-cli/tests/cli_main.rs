//! End-to-end tests for the `pillbuddy` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Long past, so the bottle-out timer and the event TTL have both run out.
const REMOVED_AT: i64 = 1_700_000_000_000;

fn pillbuddy(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pillbuddy").unwrap();
    cmd.env_remove("PILLBUDDY_WEBHOOK_URL")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir.path());
    cmd
}

fn removal_envelope(sequence: i64) -> String {
    format!(
        r#"{{"device_id":"pb-1","event_type":"slot_state_changed","slot":2,"in_holder":false,"ts_ms":{},"sequence":{}}}"#,
        REMOVED_AT, sequence
    )
}

fn setup_lisinopril(data_dir: &TempDir) {
    pillbuddy(data_dir)
        .args(["setup", "pb-1", "2", "Lisinopril", "30", "--refills"])
        .assert()
        .success();
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("pillbuddy")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("setup"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("purge"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("pillbuddy")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pillbuddy"));
}

#[test]
fn test_no_subcommand_shows_error() {
    Command::cargo_bin("pillbuddy").unwrap().assert().failure();
}

#[test]
fn test_serve_help_lists_broker_flags() {
    Command::cargo_bin("pillbuddy")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--broker"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--scan-interval"));
}

#[test]
fn test_invalid_port_rejected() {
    Command::cargo_bin("pillbuddy")
        .unwrap()
        .args(["serve", "--port", "not-a-port"])
        .assert()
        .failure();
}

#[test]
fn test_zero_scan_interval_rejected() {
    Command::cargo_bin("pillbuddy")
        .unwrap()
        .args(["serve", "--scan-interval", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--scan-interval"));
}

#[test]
fn test_setup_lights_slot_and_persists() {
    let dir = TempDir::new().unwrap();

    pillbuddy(&dir)
        .args(["setup", "pb-1", "2", "Lisinopril", "30", "--refills"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Slot 2 of pb-1 is set up for Lisinopril with 30 pills.",
        ))
        .stdout(predicate::str::contains(
            r#"command pb-1 {"action":"turn_on","slot":2}"#,
        ));

    pillbuddy(&dir)
        .args(["status", "pb-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Slot 2 has Lisinopril with 30 pills remaining.",
        ));
}

#[test]
fn test_setup_rejects_bad_slot() {
    let dir = TempDir::new().unwrap();
    pillbuddy(&dir)
        .args(["setup", "pb-1", "4", "Lisinopril", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("slot"));
}

#[test]
fn test_status_of_unknown_holder() {
    let dir = TempDir::new().unwrap();
    pillbuddy(&dir)
        .args(["status", "pb-404"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "You don't have any prescriptions set up yet.",
        ));
}

#[test]
fn test_status_json() {
    let dir = TempDir::new().unwrap();
    setup_lisinopril(&dir);
    pillbuddy(&dir)
        .args(["status", "pb-1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""prescription_name": "Lisinopril""#))
        .stdout(predicate::str::contains(r#""pill_count": 30"#));
}

#[test]
fn test_ingest_counts_dose_then_skips_redelivery() {
    let dir = TempDir::new().unwrap();
    setup_lisinopril(&dir);

    pillbuddy(&dir)
        .args(["ingest", "-"])
        .write_stdin(removal_envelope(7))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Excellent! You're staying on track with your Lisinopril.",
        ))
        .stdout(predicate::str::contains(r#""status": "applied""#))
        .stdout(predicate::str::contains(r#""remaining": 29"#))
        .stdout(predicate::str::contains(r#""watermark": 7"#));

    pillbuddy(&dir)
        .args(["ingest", "-"])
        .write_stdin(removal_envelope(7))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "duplicate""#))
        .stdout(predicate::str::contains("Excellent!").not());

    pillbuddy(&dir)
        .args(["status", "pb-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Slot 2 has Lisinopril with 29 pills remaining.",
        ));
}

#[test]
fn test_ingest_from_file_with_topic_device() {
    let dir = TempDir::new().unwrap();
    let envelope = dir.path().join("event.json");
    std::fs::write(
        &envelope,
        r#"{"event_type":"slot_state_changed","slot":1,"in_holder":true,"sequence":3}"#,
    )
    .unwrap();

    pillbuddy(&dir)
        .arg("ingest")
        .arg(&envelope)
        .args(["--device", "pb-7"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""device_id": "pb-7""#))
        .stdout(predicate::str::contains(r#""kind": "unconfigured""#));
}

#[test]
fn test_ingest_rejects_out_of_range_slot() {
    let dir = TempDir::new().unwrap();
    pillbuddy(&dir)
        .args(["ingest", "-"])
        .write_stdin(
            r#"{"device_id":"pb-1","event_type":"slot_state_changed","slot":4,"in_holder":false}"#,
        )
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status": "rejected""#))
        .stderr(predicate::str::contains("event rejected"));
}

#[test]
fn test_ingest_missing_file() {
    let dir = TempDir::new().unwrap();
    pillbuddy(&dir)
        .args(["ingest", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_scan_reminds_about_bottle_left_out() {
    let dir = TempDir::new().unwrap();
    setup_lisinopril(&dir);
    pillbuddy(&dir)
        .args(["ingest", "-"])
        .write_stdin(removal_envelope(1))
        .assert()
        .success();

    pillbuddy(&dir)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Reminder: Please return your Lisinopril bottle to slot 2 of your PillBuddy.",
        ))
        .stdout(predicate::str::contains(r#""notified": 1"#));
}

#[test]
fn test_scan_with_nothing_out() {
    let dir = TempDir::new().unwrap();
    setup_lisinopril(&dir);
    pillbuddy(&dir)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""checked": 0"#));
}

#[test]
fn test_purge_drops_expired_events() {
    let dir = TempDir::new().unwrap();
    setup_lisinopril(&dir);
    pillbuddy(&dir)
        .args(["ingest", "-"])
        .write_stdin(removal_envelope(1))
        .assert()
        .success();

    pillbuddy(&dir)
        .arg("purge")
        .assert()
        .success()
        .stdout(predicate::str::contains("Purged 1 expired event records."));

    pillbuddy(&dir)
        .arg("purge")
        .assert()
        .success()
        .stdout(predicate::str::contains("Purged 0 expired event records."));
}
