//! CLI subprocess integration tests.
//!
//! These tests invoke the `slipway` binary against the mock backend and a
//! temporary state directory, and verify exit codes, stdout content, and JSON
//! output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const STACK: &str = r#"
[[network]]
name = "net"
subnet = "10.0.0.0/16"

[[container]]
name = "app"
image = "nginx:1.25"
network = "network.net"

[[ingress]]
name = "web"
target = "container.app"

[[ingress.ports]]
local = 8080
remote = 80
host = 18080
"#;

const APPLY_ORDER: [&str; 4] = ["wan.wan", "network.net", "container.app", "ingress.web"];

fn slipway_bin(state: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_slipway"));
    cmd.arg("--state").arg(state);
    cmd.env_remove("SLIPWAY_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("stack.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn run(state: &Path, args: &[&str]) -> Output {
    slipway_bin(state).args(args).output().unwrap()
}

fn json_stdout(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn listed(state: &Path) -> Vec<String> {
    let list = json_stdout(&run(state, &["list", "--json"]));
    list.as_array()
        .unwrap()
        .iter()
        .map(|r| r["address"].as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn cli_version_exits_zero() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("slipway"));
}

#[test]
fn cli_help_lists_commands() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["validate", "plan", "apply", "destroy", "list", "inspect"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_validate_reports_order() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), STACK);

    let out = json_stdout(&run(
        state.path(),
        &["validate", config.to_str().unwrap(), "--json"],
    ));
    assert_eq!(out["valid"], true);
    assert_eq!(out["resources"], 4);
    assert_eq!(out["order"], serde_json::json!(APPLY_ORDER));
    assert!(
        !state.path().join("state").exists(),
        "validate must not create state"
    );
}

#[test]
fn cli_validate_missing_reference_exits_2() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(
        project.path(),
        "[[container]]\nname = \"app\"\nimage = \"nginx\"\nnetwork = \"network.missing\"\n",
    );

    let output = run(state.path(), &["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("container.app"));
    assert!(stderr.contains("network.missing"));
}

#[test]
fn cli_validate_unknown_field_exits_2() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(
        project.path(),
        "[[network]]\nname = \"net\"\nsubnet = \"10.0.0.0/16\"\ncolour = \"blue\"\n",
    );

    let output = run(state.path(), &["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_plan_json_has_levels() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), STACK);

    let plan = json_stdout(&run(
        state.path(),
        &["plan", config.to_str().unwrap(), "--json"],
    ));
    let steps = plan["steps"].as_array().unwrap();
    let order: Vec<&str> = steps
        .iter()
        .map(|s| s["address"].as_str().unwrap())
        .collect();
    assert_eq!(order, APPLY_ORDER);
    assert_eq!(steps[0]["level"], 0);
    assert_eq!(steps[3]["level"], 2);
    assert!(steps.iter().all(|s| s.get("recorded").is_none()));
}

#[test]
fn cli_apply_list_destroy_roundtrip() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), STACK);
    let config = config.to_str().unwrap();

    let report = json_stdout(&run(state.path(), &["apply", config, "--json"]));
    assert_eq!(report["applied"], serde_json::json!(APPLY_ORDER));
    assert_eq!(listed(state.path()), APPLY_ORDER);

    let record = json_stdout(&run(state.path(), &["inspect", "container.app", "--json"]));
    assert_eq!(record["state"], "created");
    assert!(record["provider_id"].as_str().unwrap().starts_with("mock-"));

    let again = json_stdout(&run(state.path(), &["apply", config, "--json"]));
    assert_eq!(again["previously_recorded"], serde_json::json!(APPLY_ORDER));

    let destroyed = json_stdout(&run(state.path(), &["destroy", config, "--json"]));
    let mut reversed = APPLY_ORDER;
    reversed.reverse();
    assert_eq!(destroyed["destroyed"], serde_json::json!(reversed));
    assert!(listed(state.path()).is_empty());
}

#[test]
fn cli_destroy_all_uses_recorded_state() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), STACK);

    let output = run(state.path(), &["apply", config.to_str().unwrap()]);
    assert!(output.status.success());
    std::fs::remove_file(&config).unwrap();

    let destroyed = json_stdout(&run(state.path(), &["destroy", "--all", "--json"]));
    assert_eq!(destroyed["destroyed"].as_array().unwrap().len(), 4);
    assert!(listed(state.path()).is_empty());
}

#[test]
fn cli_parallel_apply() {
    let state = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let config = write_config(project.path(), STACK);

    let report = json_stdout(&run(
        state.path(),
        &["apply", config.to_str().unwrap(), "--jobs", "4", "--json"],
    ));
    assert_eq!(report["applied"], serde_json::json!(APPLY_ORDER));
}

#[test]
fn cli_list_empty_state() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["list"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no resources recorded"));
}

#[test]
fn cli_inspect_unknown_exits_1() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["inspect", "container.ghost"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("container.ghost"));
}

#[test]
fn cli_unknown_backend_exits_1() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["--backend", "docker", "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("docker"));
}

#[test]
fn cli_completions_bash() {
    let state = tempfile::tempdir().unwrap();
    let output = run(state.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("slipway"));
}
