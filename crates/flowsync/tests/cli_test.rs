//! Integration tests for the `flowsync` CLI binary.
//!
//! Each test gets its own temp dir holding the config file and the JSON
//! table store, so nothing touches the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const RX: &str = "10.0.0.1/10.0.0.2:5004";
const PAIR_ID: &str = "9a1c0f5e-2b7d-4e0a-8c61-3f2d4b5a6c7d";

// ── Helpers ─────────────────────────────────────────────────────────

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// Temp dir with an empty config path and a table file holding `eth0`.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tables = r#"{"Interfaces": [{"key": "eth0", "cells": {"Description": "uplink", "OperationalStatus": 1}}]}"#;
        std::fs::write(dir.path().join("tables.json"), tables).unwrap();
        Self { dir }
    }

    fn tables(&self) -> PathBuf {
        self.dir.path().join("tables.json")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// `flowsync` with env isolation and this workspace's files.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = flowsync_cmd();
        cmd.arg("--config")
            .arg(self.config())
            .arg("--tables")
            .arg(self.tables());
        cmd
    }

    fn stored(&self) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(self.tables()).unwrap()).unwrap()
    }
}

/// Build a [`Command`] for the `flowsync` binary with env isolation.
fn flowsync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("flowsync");
    cmd.env("HOME", "/tmp/flowsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/flowsync-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/flowsync-cli-test-nonexistent")
        .env_remove("FLOWSYNC_ELEMENT")
        .env_remove("FLOWSYNC_CONFIG_FILE")
        .env_remove("FLOWSYNC_TABLES")
        .env_remove("FLOWSYNC_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn call(action: &str, id: Option<&str>, message_id: &str) -> String {
    let id = id.map_or(String::new(), |id| {
        format!(r#", "OptionalDestinationIdentifier": "{id}""#)
    });
    format!(
        r#"{{"Messages": [{{"MessageId": "{message_id}", "ActionType": "{action}", "FlowTransportIp": {{"SourceIp": "10.0.0.1", "DestinationIp": "10.0.0.2", "DestinationPort": 5004, "BitRate": 2000000.0}}, "Interface": "eth0", "FlowId": "remote-rx", "SourceFlowId": "remote-src"{id}}}]}}"#
    )
}

fn replay(ws: &Workspace, lines: &[String]) -> std::process::Output {
    let file = ws.write("calls.jsonl", &lines.join("\n"));
    ws.cmd().arg("replay").arg(&file).output().unwrap()
}

fn rx_rows(stored: &serde_json::Value) -> Vec<serde_json::Value> {
    stored["IncomingFlows"].as_array().cloned().unwrap_or_default()
}

fn as_path(p: &Path) -> String {
    p.display().to_string()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = flowsync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    flowsync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("replay")
            .and(predicate::str::contains("provisioned"))
            .and(predicate::str::contains("set-expected"))
            .and(predicate::str::contains("bootstrap")),
    );
}

#[test]
fn test_invalid_direction_is_usage_error() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["flows", "sideways"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_prints_override() {
    let ws = Workspace::new();
    flowsync_cmd()
        .arg("--config")
        .arg(ws.config())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(as_path(&ws.config())));
}

#[test]
fn test_config_show_reports_defaults() {
    let ws = Workspace::new();
    flowsync_cmd()
        .arg("--config")
        .arg(ws.config())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_element = \"default\""));
}

#[test]
fn test_unknown_element_exits_not_found() {
    let ws = Workspace::new();
    let output = flowsync_cmd()
        .arg("--config")
        .arg(ws.config())
        .args(["--element", "ghost", "provisioned"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("ghost"));
}

#[test]
fn test_invalid_profile_is_config_error() {
    let ws = Workspace::new();
    std::fs::write(
        ws.config(),
        "[elements.default]\nbitrate_tolerance_pct = 400.0\n",
    )
    .unwrap();
    let output = ws.cmd().arg("provisioned").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("bitrate_tolerance_pct"));
}

// ── Provisioning replay ─────────────────────────────────────────────

#[test]
fn test_replay_create_persists_pair() {
    let ws = Workspace::new();
    let output = replay(
        &ws,
        &[call("Create", Some(PAIR_ID), "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok"));

    let stored = ws.stored();
    let rx = rx_rows(&stored);
    assert_eq!(rx.len(), 1);
    assert_eq!(rx[0]["key"], RX);
    assert_eq!(rx[0]["cells"]["LinkedFlow"], "remote-rx");
    assert_eq!(stored["ProvisionedFlows"][0]["key"], PAIR_ID);

    ws.cmd()
        .args(["-o", "json", "provisioned"])
        .assert()
        .success()
        .stdout(predicate::str::contains(PAIR_ID).and(predicate::str::contains(RX)));
}

#[test]
fn test_replay_skips_unreadable_lines() {
    let ws = Workspace::new();
    let output = replay(
        &ws,
        &[
            "{ not json".to_owned(),
            call("Create", None, "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e"),
        ],
    );
    assert!(output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("1 applied"), "{text}");
    assert!(text.contains("1 unreadable"), "{text}");
    assert_eq!(rx_rows(&ws.stored()).len(), 1);
}

#[test]
fn test_replay_create_then_delete_removes_absent_flow() {
    let ws = Workspace::new();
    let output = replay(
        &ws,
        &[
            call("Create", None, "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e"),
            call("Delete", None, "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5f"),
        ],
    );
    assert!(output.status.success());
    assert!(rx_rows(&ws.stored()).is_empty());
}

#[test]
fn test_replay_reports_rejections() {
    let ws = Workspace::new();
    let output = replay(
        &ws,
        &[call("Modify", Some(PAIR_ID), "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    assert!(output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("rejected"), "{text}");
    assert!(text.contains("Modify"), "{text}");
}

// ── Operator edits ──────────────────────────────────────────────────

#[test]
fn test_set_expected_updates_status() {
    let ws = Workspace::new();
    replay(
        &ws,
        &[call("Create", Some(PAIR_ID), "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    let samples = ws.write(
        "samples.json",
        &format!(r#"{{"rx": [{{"instance": "{RX}", "bitrate": 1900000.0}}]}}"#),
    );
    ws.cmd().arg("observe").arg(&samples).assert().success();

    ws.cmd()
        .args(["-o", "json", "set-expected", "rx", RX, "1000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"expected_bitrate\": 1000000.0"));

    let rx = rx_rows(&ws.stored());
    assert_eq!(rx[0]["cells"]["ExpectedBitrateStatus"], 3);
}

#[test]
fn test_set_expected_on_absent_flow_is_a_note() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["set-expected", "tx", "nope", "5"])
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing changed"));
}

#[test]
fn test_set_expected_negative_clears() {
    let ws = Workspace::new();
    replay(
        &ws,
        &[call("Create", None, "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    ws.cmd()
        .args(["set-expected", "rx", RX, "-5"])
        .assert()
        .success();
    assert_eq!(rx_rows(&ws.stored())[0]["cells"]["ExpectedBitrate"], -1.0);
}

#[test]
fn test_delete_flow_removes_row() {
    let ws = Workspace::new();
    replay(
        &ws,
        &[call("Create", None, "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    ws.cmd()
        .args(["delete-flow", "rx", RX])
        .assert()
        .success()
        .stderr(predicate::str::contains("Deleted rx flow"));
    assert!(rx_rows(&ws.stored()).is_empty());
}

#[test]
fn test_delete_provisioned_unknown_id_is_not_found() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["delete-provisioned", PAIR_ID])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

#[test]
fn test_delete_provisioned_bad_id_is_usage_error() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["delete-provisioned", "not-a-guid"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_delete_provisioned_tears_down_pair() {
    let ws = Workspace::new();
    replay(
        &ws,
        &[call("Create", Some(PAIR_ID), "0b8f7d1e-4c22-4f0e-9f35-7a1f2b3c4d5e")],
    );
    ws.cmd()
        .args(["delete-provisioned", PAIR_ID])
        .assert()
        .success()
        .stderr(predicate::str::contains("released"));

    let stored = ws.stored();
    assert!(rx_rows(&stored).is_empty());
    assert_eq!(stored["ProvisionedFlows"].as_array().map(Vec::len), Some(0));
}

// ── Discovery / interfaces ──────────────────────────────────────────

#[test]
fn test_observe_updates_interface_statistics() {
    let ws = Workspace::new();
    let samples = ws.write(
        "samples.json",
        r#"{"rx": [{"instance": "a/b:1", "bitrate": 1500.0, "interface": "eth0"}]}"#,
    );
    ws.cmd()
        .args(["-o", "json"])
        .arg("observe")
        .arg(&samples)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rx_flows\": 1"));

    ws.cmd()
        .args(["interfaces"])
        .assert()
        .success()
        .stdout(predicate::str::contains("uplink").and(predicate::str::contains("1.5 kbps")));
}

#[test]
fn test_observe_rejects_malformed_samples() {
    let ws = Workspace::new();
    let samples = ws.write("samples.json", "[1, 2");
    let output = ws.cmd().arg("observe").arg(&samples).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_bootstrap_loads_interfaces() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["-o", "json", "bootstrap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"eth0\""));
}

#[test]
fn test_quiet_suppresses_listing() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["-q", "interfaces"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
