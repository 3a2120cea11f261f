pub mod apply;
pub mod completions;
pub mod destroy;
pub mod inspect;
pub mod list;
pub mod plan;
pub mod validate;

use indicatif::{ProgressBar, ProgressStyle};
use slipway_schema::{blueprint_folder, is_local_folder, parse_path, Configuration};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STATE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "created" => Style::new().green().apply_to(state).to_string(),
        "create_failed" => Style::new().red().bold().apply_to(state).to_string(),
        "resolved" => Style::new().yellow().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

/// Local path for a configuration argument: an existing path as given, the
/// subfolder of a blueprint URI otherwise.
pub fn config_location(source: &str) -> Result<PathBuf, String> {
    if is_local_folder(source) || Path::new(source).exists() || !source.contains("//") {
        return Ok(PathBuf::from(source));
    }
    blueprint_folder(source)
        .map(PathBuf::from)
        .map_err(|e| format!("configuration error: {e}"))
}

/// Parse the configuration named by a command-line argument.
pub fn load_configuration(source: &str) -> Result<Configuration, String> {
    let path = config_location(source)?;
    parse_path(&path).map_err(|e| format!("configuration error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_state_keeps_text() {
        for state in ["created", "create_failed", "resolved"] {
            assert!(colorize_state(state).contains(state));
        }
        assert_eq!(colorize_state("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONFIG_ERROR);
        assert_ne!(EXIT_CONFIG_ERROR, EXIT_STATE_ERROR);
    }

    #[test]
    fn blueprint_uri_maps_to_subfolder() {
        assert_eq!(
            config_location("github.com/acme/blueprints//vault").unwrap(),
            PathBuf::from("vault")
        );
    }

    #[test]
    fn malformed_blueprint_uri_is_a_configuration_error() {
        let err = config_location("a//b//c").unwrap_err();
        assert!(err.starts_with("configuration error:"));
    }

    #[test]
    fn existing_paths_are_used_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        assert_eq!(config_location(&path).unwrap(), PathBuf::from(&path));
    }

    #[test]
    fn load_configuration_reads_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("net.toml"),
            "[[network]]\nname = \"net\"\nsubnet = \"10.0.0.0/16\"\n",
        )
        .unwrap();
        let config = load_configuration(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(config.networks.len(), 1);
        assert!(config.wan.is_some());
    }

    #[test]
    fn load_configuration_reports_missing_path() {
        let err = load_configuration("/definitely/not/here.toml").unwrap_err();
        assert!(err.starts_with("configuration error:"));
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
