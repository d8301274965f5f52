//! Integration tests for the `opnmirror` binary.
//!
//! These cover argument parsing, completions, the state file, and every
//! command that works from the local mirror alone. No appliance is
//! contacted.
#![allow(clippy::unwrap_used)]

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

use opnmirror_core::store::ServerSnapshot;
use opnmirror_core::{Interface, MirrorSnapshot, MirrorStore, Server, ServerId, Vlan, VlanTag};

// ── Helpers ─────────────────────────────────────────────────────────

/// A temp directory holding the config, state, and declaration files.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> PathBuf {
        self.path("config.toml")
    }

    fn state(&self) -> PathBuf {
        self.path("state.json")
    }

    fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    /// `opnmirror` with env isolation and this workspace's files.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("opnmirror");
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env("XDG_DATA_HOME", self.dir.path())
            .env("NO_COLOR", "1")
            .env_remove("OPNMIRROR_PROFILE")
            .env_remove("OPNMIRROR_OUTPUT")
            .env_remove("OPNMIRROR_INSECURE")
            .env_remove("OPNMIRROR_TIMEOUT")
            .env_remove("OPNMIRROR_API_KEY")
            .env_remove("OPNMIRROR_API_SECRET")
            .arg("--config")
            .arg(self.config())
            .arg("--state")
            .arg(self.state());
        cmd
    }

    /// A state file with server `fw1`: lan on igc1 and VLAN 100 on igc1.
    fn with_fw1(self) -> Self {
        let store = MirrorStore::new();
        store.upsert(Interface {
            name: "lan".into(),
            device: "igc1".into(),
            description: "LAN".into(),
            ip_address: Some(Ipv4Addr::new(192, 168, 1, 1)),
            subnet_bits: Some(24),
            enabled: true,
        });
        store.upsert(Vlan {
            parent_interface: "igc1".into(),
            tag: VlanTag::new(100).unwrap(),
            device: "vlan0.100".into(),
            description: "iot".into(),
            priority: 0,
            remote_id: Some("v-1".into()),
        });

        let base = MirrorSnapshot::default();
        let snapshot = MirrorSnapshot {
            servers: vec![ServerSnapshot {
                server: Server {
                    id: ServerId::new(),
                    name: "fw1".into(),
                    hostname: "fw.example.net".into(),
                    verify_ssl: false,
                    credential_ref: "keyring:opnmirror/fw1/api-secret".into(),
                    product_version: Some("24.7.1".into()),
                    registered_at: base.saved_at,
                },
                sync_info: None,
                store: store.to_snapshot(),
            }],
            ..base
        };
        std::fs::write(self.state(), serde_json::to_string(&snapshot).unwrap()).unwrap();
        self
    }
}

fn vlan_decl(ws: &Workspace, tag: u16) -> PathBuf {
    ws.write(
        "vlan.yaml",
        &format!("kind: vlan\nparent_interface: igc1\ntag: {tag}\ndescription: test\n"),
    )
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn state_text(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let ws = Workspace::new();
    let output = cargo_bin_cmd!("opnmirror").env("HOME", ws.dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    Workspace::new().cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("server")
            .and(predicate::str::contains("sync"))
            .and(predicate::str::contains("check"))
            .and(predicate::str::contains("deploy")),
    );
}

#[test]
fn test_version_flag() {
    Workspace::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("opnmirror"));
}

#[test]
fn test_completions_zsh() {
    Workspace::new()
        .cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_output_format() {
    let output = Workspace::new()
        .cmd()
        .args(["--output", "xml", "server", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("invalid") || text.contains("possible values"), "{text}");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_reports_overrides() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(ws.config().display().to_string())
                .and(predicate::str::contains(ws.state().display().to_string())),
        );
}

#[test]
fn test_config_show_without_file_renders_defaults() {
    Workspace::new()
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

#[test]
fn test_config_profiles_lists_file_profiles() {
    let ws = Workspace::new();
    ws.write(
        "config.toml",
        "default_profile = \"fw1\"\n\n[profiles.fw1]\nhostname = \"fw.example.net\"\n",
    );
    ws.cmd()
        .args(["-o", "plain", "config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fw1"));
}

// ── Server registry (offline) ───────────────────────────────────────

#[test]
fn test_server_list_empty_without_state() {
    Workspace::new()
        .cmd()
        .args(["-o", "json-compact", "server", "list"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_server_list_reads_state_file() {
    let ws = Workspace::new().with_fw1();
    ws.cmd()
        .args(["-o", "json", "server", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fw1\"").and(predicate::str::contains("fw.example.net")));
}

#[test]
fn test_server_remove_updates_state_file() {
    let ws = Workspace::new().with_fw1();
    ws.cmd().args(["--yes", "server", "remove", "fw1"]).assert().success();
    assert!(!state_text(&ws.state()).contains("fw.example.net"));
}

#[test]
fn test_server_remove_unknown_is_not_found() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["--yes", "server", "remove", "ghost"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_sync_without_profile_is_a_usage_error() {
    let ws = Workspace::new().with_fw1();
    let output = ws.cmd().args(["-p", "fw1", "sync"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Profile 'fw1' not found"));
}

#[test]
fn test_corrupt_state_file_is_reported() {
    let ws = Workspace::new();
    ws.write("state.json", "{ nope");
    let output = ws.cmd().args(["server", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Cannot read mirror state"));
}

#[test]
fn test_sync_reports_in_progress_while_state_is_locked() {
    let ws = Workspace::new().with_fw1();
    let before = state_text(&ws.state());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(ws.path("state.json.lock"))
        .unwrap();
    let mut lock = fd_lock::RwLock::new(file);
    let _held = lock.try_write().unwrap();

    let output = ws.cmd().args(["-p", "fw1", "sync"]).output().unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("Sync already in progress"));
    assert_eq!(state_text(&ws.state()), before);
}

#[test]
fn test_read_only_commands_ignore_the_state_lock() {
    let ws = Workspace::new().with_fw1();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(ws.path("state.json.lock"))
        .unwrap();
    let mut lock = fd_lock::RwLock::new(file);
    let _held = lock.try_write().unwrap();

    ws.cmd()
        .args(["-p", "fw1", "-o", "plain", "list", "vlans"])
        .assert()
        .success()
        .stdout(predicate::str::diff("igc1/100\n"));
}

// ── Resources and conflict checks ───────────────────────────────────

#[test]
fn test_list_vlans_from_mirror() {
    let ws = Workspace::new().with_fw1();
    ws.cmd()
        .args(["-p", "fw1", "-o", "plain", "list", "vlans"])
        .assert()
        .success()
        .stdout(predicate::str::diff("igc1/100\n"));
}

#[test]
fn test_check_reports_vlan_conflict() {
    let ws = Workspace::new().with_fw1();
    let decl = vlan_decl(&ws, 100);
    let output = ws.cmd().args(["-p", "fw1", "check"]).arg(decl).output().unwrap();
    assert_eq!(output.status.code(), Some(6));
    let text = combined_output(&output);
    assert!(text.contains("VLAN 100 is already in use"), "{text}");
}

#[test]
fn test_check_clean_declaration_succeeds() {
    let ws = Workspace::new().with_fw1();
    let decl = vlan_decl(&ws, 200);
    ws.cmd()
        .args(["-p", "fw1", "check"])
        .arg(decl)
        .assert()
        .success()
        .stdout(predicate::str::contains("vlan igc1/200"));
}

#[test]
fn test_batch_conflicts_within_one_file() {
    let ws = Workspace::new().with_fw1();
    let decl = ws.write(
        "batch.yaml",
        "resources:\n  - kind: vlan\n    parent_interface: igc1\n    tag: 300\n  - kind: vlan\n    parent_interface: igc1\n    tag: 300\n",
    );
    let output = ws
        .cmd()
        .args(["-p", "fw1", "-o", "json", "check"])
        .arg(decl)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"pending\": true"));
}

#[test]
fn test_deploy_dry_run_does_not_touch_state() {
    let ws = Workspace::new().with_fw1();
    let before = state_text(&ws.state());
    let decl = vlan_decl(&ws, 200);
    ws.cmd()
        .args(["-p", "fw1", "deploy", "--dry-run"])
        .arg(decl)
        .assert()
        .success();
    assert_eq!(state_text(&ws.state()), before);
}

#[test]
fn test_check_unregistered_server_is_not_found() {
    let ws = Workspace::new();
    let decl = vlan_decl(&ws, 200);
    let output = ws.cmd().args(["-p", "fw9", "check"]).arg(decl).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_invalid_declaration_names_the_resource() {
    let ws = Workspace::new().with_fw1();
    let decl = ws.write("bad.yaml", "kind: vlan\nparent_interface: igc1\ntag: 5000\n");
    let output = ws.cmd().args(["-p", "fw1", "check"]).arg(decl).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("resource #1"));
}

// ── Containers ──────────────────────────────────────────────────────

#[test]
fn test_container_remove_requires_yes_without_terminal() {
    let ws = Workspace::new().with_fw1();
    let output = ws
        .cmd()
        .args(["-p", "fw1", "container", "remove", "web"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[test]
fn test_container_remove_unknown_is_not_found() {
    let ws = Workspace::new().with_fw1();
    let output = ws
        .cmd()
        .args(["-p", "fw1", "--yes", "container", "remove", "web"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("container 'web' not found"));
}
