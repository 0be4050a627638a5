//! CLI smoke tests: commands that work without a bot token or API key.
//!
//! Each run gets its own HOME so the user's real config is never touched.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run aptoclaw with `args` under `home`; returns (exit_code, stdout, stderr).
fn run_cli_in(home: &Path, args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_aptoclaw");
    let output = Command::new(bin)
        .args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("RUST_LOG", "off")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .env_remove("APTOCLAW_CHANNELS_TELEGRAM_TOKEN")
        .env_remove("APTOCLAW_PROVIDERS_OPENAI_API_KEY")
        .output()
        .expect("failed to execute aptoclaw binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn run_cli(args: &[&str]) -> (i32, String, String) {
    let home = TempDir::new().unwrap();
    run_cli_in(home.path(), args)
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(&[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("aptoclaw"));
}

#[test]
fn cli_help_lists_commands() {
    let (code, stdout, _stderr) = run_cli(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("gateway"));
    assert!(stdout.contains("config"));
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(&["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("aptoclaw"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_path_is_under_home() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli_in(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.json"), "got: {}", stdout);
    assert!(stdout.contains(".aptoclaw"));
}

#[test]
fn cli_config_init_writes_defaults_once() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli_in(home.path(), &["config", "init"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Wrote default config"));

    let written = home.path().join(".aptoclaw").join("config.json");
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
    assert_eq!(raw["chain"]["network"], "mainnet");

    let (code, stdout, _stderr) = run_cli_in(home.path(), &["config", "init"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("already exists"));
}

#[test]
fn cli_config_check_reports_missing_credentials() {
    let (code, stdout, _stderr) = run_cli(&["config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Config file:"));
    assert!(stdout.contains("[ERROR]"), "got: {}", stdout);
    assert!(stdout.contains("providers.openai.api_key"));
}

// ============================================================================
// Gateway & edge cases
// ============================================================================

#[test]
fn cli_gateway_refuses_unusable_config() {
    let (code, _stdout, stderr) = run_cli(&["gateway"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("config check"), "got stderr: {}", stderr);
}

#[test]
fn cli_gateway_help() {
    let (code, stdout, _stderr) = run_cli(&["gateway", "--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Telegram"));
}

#[test]
fn cli_invalid_command() {
    let (code, _stdout, stderr) = run_cli(&["nonexistent-command"]);
    assert_ne!(code, 0);
    assert!(
        stderr.contains("error") || stderr.contains("unrecognized"),
        "Expected error message for invalid command, got stderr: {}",
        stderr
    );
}
