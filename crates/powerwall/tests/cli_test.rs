#![allow(clippy::unwrap_used)]
// Binary surface tests: argument parsing, config errors, one-shot fetch.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn powerwall() -> Command {
    let mut cmd = Command::cargo_bin("powerwall").unwrap();
    cmd.env_clear().env("RUST_LOG", "off");
    cmd
}

#[test]
fn help_lists_subcommands() {
    powerwall()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("--log-format"));
}

#[test]
fn version_flag() {
    powerwall()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_log_format_is_usage_error() {
    powerwall()
        .args(["--log-format", "xml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("xml"));
}

#[test]
fn missing_gateway_exits_with_config_code() {
    powerwall()
        .arg("fetch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("TESLA_GATEWAY"));
}

#[test]
fn run_requires_sink_settings() {
    powerwall()
        .env("TESLA_GATEWAY", "https://192.168.91.1")
        .env("TESLA_EMAIL", "owner@example.com")
        .env("TESLA_PASSWORD", "hunter2")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("TESLA_INFLUXHOST"));
}

#[test]
fn oversized_interval_exits_with_config_code() {
    powerwall()
        .env("TESLA_GATEWAY", "https://192.168.91.1")
        .env("TESLA_EMAIL", "owner@example.com")
        .env("TESLA_PASSWORD", "0123")
        .env("TESLA_INFLUXHOST", "http://influx:8086")
        .env("TESLA_INFLUXBUCKET", "tesla")
        .env("TESLA_INFLUXORG", "home")
        .env("TESLA_INFLUXTOKEN", "t0ken")
        .env("TESLA_INTERVAL", "18446744073709551615")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("interval"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_prints_both_readings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "AuthCookie=t; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/meters/aggregates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "site": { "instant_power": -13 },
            "solar": { "instant_power": 4022 },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "percentage": 60.3277636547622 })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        powerwall()
            .arg("fetch")
            .env("TESLA_GATEWAY", uri)
            .env("TESLA_EMAIL", "owner@example.com")
            .env("TESLA_PASSWORD", "hunter2")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    })
    .await
    .unwrap();

    let printed: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(
        printed,
        json!({
            "inverter": { "site_instant_power": -13, "solar_instant_power": 4022 },
            "battery": { "percentage": 60.3277636547622 },
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_rejected_login_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        powerwall()
            .arg("fetch")
            .env("TESLA_GATEWAY", uri)
            .env("TESLA_EMAIL", "owner@example.com")
            .env("TESLA_PASSWORD", "wrong")
            .assert()
            .code(3)
            .stderr(predicate::str::contains("bad credentials"));
    })
    .await
    .unwrap();
}
