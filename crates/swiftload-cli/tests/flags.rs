use std::fs;
use std::time::Duration;

mod common;
use common::{run_with_timeout, swiftload};

const TIMEOUT: Duration = Duration::from_secs(30);

#[test]
fn missing_credentials_exit_with_usage() {
    let work = tempfile::tempdir().expect("tempdir");
    fs::create_dir(work.path().join("data")).expect("data dir");

    let mut cmd = swiftload(work.path());
    cmd.arg("--dir").arg("data");
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ERROR:") && stderr.contains("are required"),
        "stderr:\n{stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "stdout:\n{stdout}");
}

#[test]
fn malformed_identity_exits_2() {
    let work = tempfile::tempdir().expect("tempdir");
    fs::create_dir(work.path().join("data")).expect("data dir");

    let mut cmd = swiftload(work.path());
    cmd.args(["--dir", "data", "--identity", "no-colon", "--password", "pw"]);
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<tenant>:<username>"), "stderr:\n{stderr}");
}

#[test]
fn zero_batch_is_rejected() {
    let work = tempfile::tempdir().expect("tempdir");

    let mut cmd = swiftload(work.path());
    cmd.args(["--batch", "0"]);
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_upload_dir_exits_2() {
    let work = tempfile::tempdir().expect("tempdir");

    let mut cmd = swiftload(work.path());
    cmd.args(["--dir", "nowhere", "--identity", "t:u", "--password", "pw"]);
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr:\n{stderr}");
}

#[test]
fn unreachable_auth_endpoint_is_fatal() {
    let work = tempfile::tempdir().expect("tempdir");
    let data = work.path().join("small");
    fs::create_dir(&data).expect("data dir");
    fs::write(data.join("f.txt"), b"abcd").expect("write file");

    let mut cmd = swiftload(work.path());
    cmd.args([
        "--dir",
        "small",
        "--identity",
        "t:u",
        "--endpoint",
        "http://127.0.0.1:1/v2.0",
        "--label",
        "ci",
        "--timeout",
        "5",
    ])
    .env("SWIFTLOAD_PASSWORD", "pw");
    let output = run_with_timeout(cmd, TIMEOUT);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Authentication failed"), "stderr:\n{stderr}");

    let log = fs::read_to_string(work.path().join("logs/ci_swift_small.log")).expect("log file");
    assert!(log.starts_with(":using the swift api on ci for directory 'small'"));
    assert!(!work.path().join("downloads").exists());
}
