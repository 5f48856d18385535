//! Integration tests for the `fleet` CLI binary.
//!
//! Argument parsing, completions and config handling run without a cluster;
//! the site commands run against a wiremock cluster double.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fleet` binary with env isolation.
fn fleet_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fleet");
    cmd.env("HOME", "/tmp/fleet-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fleet-cli-test-nonexistent")
        .env_remove("FLEET_CONFIG")
        .env_remove("FLEET_OUTPUT")
        .env_remove("FLEET_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A cluster double answering the identity probe and every list.
async fn cluster() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "gitVersion": "v1.29.3" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {},
            "items": [{ "metadata": { "name": "web-0", "namespace": "default" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/apis?/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metadata": {}, "items": [] })))
        .mount(&server)
        .await;
    server
}

fn site_config(name: &str, url: &str) -> String {
    format!(
        "[defaults]\nsync_timeout = 5\n\n[sites.{name}]\nmaster_url = \"{url}\"\nexec_addr = \"10.0.0.1\"\n"
    )
}

async fn run(cmd: assert_cmd::Command) -> std::process::Output {
    let mut cmd = cmd;
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fleet_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in:\n{stderr}");
}

#[test]
fn test_help_lists_commands() {
    fleet_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("sites").and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    fleet_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleet"));
}

#[test]
fn test_completions_bash() {
    fleet_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_output_format() {
    fleet_cmd()
        .args(["sites", "list", "-o", "xml"])
        .assert()
        .failure()
        .code(2);
}

// ── sites list ──────────────────────────────────────────────────────

#[test]
fn test_sites_list_plain() {
    let file = write_config(
        "[sites.east]\nmaster_url = \"https://10.0.1.1:6443\"\n\n\
         [sites.west]\nmaster_url = \"https://10.0.2.1:6443\"\n",
    );

    fleet_cmd()
        .args(["sites", "list", "-o", "plain", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout("east\nwest\n");
}

#[test]
fn test_sites_list_json() {
    let file = write_config("[sites.east]\nmaster_url = \"https://10.0.1.1:6443\"\n");

    let output = fleet_cmd()
        .args(["sites", "list", "-o", "json", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["name"], "east");
    assert_eq!(parsed[0]["master_url"], "https://10.0.1.1:6443");
}

#[test]
fn test_malformed_config_is_config_error() {
    let file = write_config("[sites.east\n");

    fleet_cmd()
        .args(["sites", "list", "--config"])
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

// ── sites check ─────────────────────────────────────────────────────

#[test]
fn test_check_unknown_site_is_not_found() {
    let file = write_config("[sites.east]\nmaster_url = \"https://10.0.1.1:6443\"\n");

    fleet_cmd()
        .args(["sites", "check", "north", "--config"])
        .arg(file.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("north"));
}

#[test]
fn test_check_empty_master_url_is_config_error() {
    let file = write_config("[sites.east]\nmaster_url = \"\"\n");

    fleet_cmd()
        .args(["sites", "check", "east", "--config"])
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("sites.east.master_url"));
}

#[test]
fn test_check_unreachable_site_is_connection_error() {
    let file = write_config(&site_config("east", "http://127.0.0.1:9"));

    fleet_cmd()
        .args(["sites", "check", "--timeout", "2", "--config"])
        .arg(file.path())
        .assert()
        .code(7);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_healthy_site() {
    let server = cluster().await;
    let file = write_config(&site_config("east", &server.uri()));

    let mut cmd = fleet_cmd();
    cmd.args(["sites", "check", "-o", "json", "--config"])
        .arg(file.path());
    let output = run(cmd).await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["name"], "east");
    assert_eq!(parsed[0]["healthy"], true);
    assert_eq!(parsed[0]["state"], "ready");
    assert_eq!(parsed[0]["version"], "v1.29.3");
}

// ── sites cache ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_cache_counts_per_kind() {
    let server = cluster().await;
    let file = write_config(&site_config("east", &server.uri()));

    let mut cmd = fleet_cmd();
    cmd.args(["sites", "cache", "east", "-o", "plain", "--config"])
        .arg(file.path());
    let output = run(cmd).await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pod\t1"), "stdout: {stdout}");
    assert!(stdout.contains("unit\t0"), "stdout: {stdout}");
}
