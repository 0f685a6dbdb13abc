//! Integration tests for the `eveus` CLI binary.
//!
//! Argument parsing, completions and config handling run without a
//! charger; the remaining tests point the binary at a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// `admin:secret`, base64-encoded.
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

/// Build a [`Command`] for the `eveus` binary with env isolation.
///
/// Clears all `EVEUS_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn eveus_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("eveus");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("EVEUS_PROFILE")
        .env_remove("EVEUS_HOST")
        .env_remove("EVEUS_USERNAME")
        .env_remove("EVEUS_PASSWORD")
        .env_remove("EVEUS_NEW_PASSWORD")
        .env_remove("EVEUS_MODEL")
        .env_remove("EVEUS_OUTPUT")
        .env_remove("EVEUS_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn telemetry() -> Value {
    json!({
        "state": 4,
        "powerMeas": 3450.0,
        "currentSet": 16,
        "voltMeas1": 230.1,
        "sessionEnergy": 4.25,
        "evseEnabled": 1,
        "oneCharge": 0,
        "verFWMain": "3.0.2"
    })
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(home: &Path, args: Vec<String>) -> std::process::Output {
    let mut cmd = eveus_cmd(home);
    cmd.args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn charger_args(server: &MockServer, rest: &[&str]) -> Vec<String> {
    let uri = server.uri();
    let mut args: Vec<String> = [
        "--host",
        uri.as_str(),
        "--username",
        "admin",
        "--password",
        "secret",
        "--wait",
        "10s",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    args.extend(rest.iter().map(ToString::to_string));
    args
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = eveus_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("Eveus")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("set-current"))
            .and(predicate::str::contains("health")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("eveus"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_output_format() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .args(["--output", "yaml", "status"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eveus"));
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config resolution ───────────────────────────────────────────────

#[test]
fn test_status_without_config_explains_setup() {
    let home = TempDir::new().unwrap();
    let output = eveus_cmd(home.path()).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(
        text.contains("No charger configured"),
        "Expected setup hint in output:\n{text}"
    );
}

#[test]
fn test_unknown_profile_is_reported() {
    let home = TempDir::new().unwrap();
    let output = eveus_cmd(home.path())
        .args(["--profile", "garage", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("garage"));
}

#[test]
fn test_set_current_out_of_range_fails_before_connecting() {
    let home = TempDir::new().unwrap();
    // Port 1 would refuse the connection; validation must win first.
    let output = eveus_cmd(home.path())
        .args(["--host", "127.0.0.1:1", "--password", "x", "set-current", "40"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("16"));
}

#[test]
fn test_unreachable_charger_exits_with_connection_code() {
    let home = TempDir::new().unwrap();
    let output = eveus_cmd(home.path())
        .args([
            "--host",
            "127.0.0.1:1",
            "--password",
            "x",
            "--wait",
            "10s",
            "status",
        ])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(7),
        "{}",
        combined_output(&output)
    );
}

#[test]
fn test_config_init_show_profiles() {
    let home = TempDir::new().unwrap();

    eveus_cmd(home.path())
        .args([
            "config",
            "init",
            "--name",
            "garage",
            "--host",
            "192.168.1.50",
            "--model",
            "32A",
            "--password-env",
            "GARAGE_PW",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Created profile 'garage'"));

    eveus_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("default_profile = \"garage\"")
                .and(predicate::str::contains("[profiles.garage]"))
                .and(predicate::str::contains("host = \"192.168.1.50\""))
                .and(predicate::str::contains("password_env = \"GARAGE_PW\"")),
        );

    eveus_cmd(home.path())
        .args(["--output", "plain", "config", "profiles"])
        .assert()
        .success()
        .stdout("garage\n");

    let path = eveus_cmd(home.path())
        .args(["config", "path"])
        .output()
        .unwrap();
    let path = String::from_utf8(path.stdout).unwrap();
    assert!(path.trim().starts_with(home.path().to_str().unwrap()));
    assert!(Path::new(path.trim()).exists());
}

#[test]
fn test_config_show_json_masks_password() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join(".config").join("eveus");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[profiles.default]\nhost = \"charger.lan\"\npassword = \"hunter2\"\n",
    )
    .unwrap();

    let output = eveus_cmd(home.path())
        .args(["--output", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(!text.contains("hunter2"));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["profiles"]["default"]["password"], "****");
}

#[test]
fn test_config_init_rejects_unknown_model() {
    let home = TempDir::new().unwrap();
    eveus_cmd(home.path())
        .args(["config", "init", "--host", "charger.lan", "--model", "40A"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("model"));
}

// ── Against a charger ───────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_json_reports_telemetry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/main"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(telemetry()))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = run(home.path(), charger_args(&server, &["-o", "json", "status"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["connection_state"], "connected");
    assert_eq!(parsed["telemetry"]["currentSet"], 16);
    assert_eq!(parsed["device"]["firmware_version"], "3.0.2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_table_shows_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telemetry()))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = run(home.path(), charger_args(&server, &["status"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("Current limit:  16 A"), "{text}");
    assert!(text.contains("Firmware:       3.0.2"), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_credentials_exit_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = run(home.path(), charger_args(&server, &["status"])).await;

    assert_eq!(
        output.status.code(),
        Some(3),
        "{}",
        combined_output(&output)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disable_posts_page_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telemetry()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pageEvent"))
        .and(body_string_contains("pageevent=evseEnabled"))
        .and(body_string_contains("evseEnabled=0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = run(
        home.path(),
        charger_args(&server, &["-o", "json", "disable", "--no-verify"]),
    )
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let receipt: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(receipt["command"], "evseEnabled");
    assert_eq!(receipt["value"], "0");
    assert_eq!(receipt["verified"], false);
    assert_eq!(receipt["attempts"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_stops_after_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(telemetry()))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let output = run(
        home.path(),
        charger_args(&server, &["-o", "plain", "watch", "--count", "1"]),
    )
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "Charging\n");
}
