//! CLI integration tests

use std::process::Command;

fn rmon() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rmon"))
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = rmon()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Resource Monitor"), "Should show app name");
    assert!(stdout.contains("report"), "Should show report command");
    assert!(stdout.contains("containers"), "Should show containers command");
    assert!(stdout.contains("values"), "Should show values command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = rmon()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("rmon"), "Should show binary name");
}

/// Test report subcommand help
#[test]
fn test_report_help() {
    let output = rmon()
        .args(["report", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Report help should succeed");
    assert!(
        stdout.contains("--interval-ms"),
        "Should show interval option"
    );
}

/// Test values write then read through the binary
#[test]
fn test_values_write_then_read() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("example.json");
    let path_arg = path.to_str().unwrap();

    let write = rmon()
        .args(["values", "write", "--path", path_arg])
        .output()
        .expect("Failed to execute command");
    assert!(write.status.success(), "Values write should succeed");

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "{\n \"Values\": {\n  \"key1\": \"value1\",\n  \"key2\": \"value2\",\n  \"key3\": \"value3\"\n }\n}"
    );

    let read = rmon()
        .args(["--format", "json", "values", "read", "--path", path_arg])
        .output()
        .expect("Failed to execute command");
    assert!(read.status.success(), "Values read should succeed");

    let doc: serde_json::Value = serde_json::from_slice(&read.stdout).unwrap();
    assert_eq!(doc["Values"]["key2"], "value2");
}

/// Test values read of a missing file fails
#[test]
fn test_values_read_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("missing.json");

    let output = rmon()
        .args(["values", "read", "--path", path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Reading a missing file should fail");
}

/// Test status against a mock monitor API
#[test]
fn test_status_json() {
    let mut server = mockito::Server::new();
    let _health = server
        .mock("GET", "/healthz")
        .with_status(200)
        .with_body(
            r#"{"status":"healthy","components":{"sources":{"status":"healthy","last_check_timestamp":0,"consecutive_failures":0}}}"#,
        )
        .create();
    let _ready = server
        .mock("GET", "/readyz")
        .with_status(200)
        .with_body(r#"{"ready":true}"#)
        .create();

    let output = rmon()
        .args(["--format", "json", "status", "--api-url", &server.url()])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Status should succeed");
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["health"]["status"], "healthy");
    assert_eq!(status["readiness"]["ready"], true);
}
