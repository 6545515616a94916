//! Snapshot tests for CLI output using insta.
//!
//! These tests capture user-facing CLI text, making it easy to review
//! changes to it.
//!
//! To update snapshots after intentional changes:
//! ```bash
//! cargo insta test --accept
//! ```

use assert_cmd::cargo::cargo_bin_cmd;

/// Normalize version and path-dependent parts of CLI output for stable snapshots
fn normalize_output(output: &str) -> String {
    let re = regex::Regex::new(r"routestack \d+\.\d+\.\d+").unwrap();
    let versioned = re.replace_all(output, "routestack [VERSION]");
    versioned
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn run(args: &[&str], dir: &std::path::Path) -> std::process::Output {
    let mut cmd = cargo_bin_cmd!("routestack");
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("ROUTESTACK_CONFIG")
        .env_remove("ROUTESTACK_STAGE")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_version_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["--version"], dir.path());
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    insta::assert_snapshot!(normalize_output(&stdout), @"routestack [VERSION]");
}

#[test]
fn test_missing_config_report_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["template"], dir.path());
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    insta::assert_snapshot!(normalize_output(&stderr), @r"
    [ERROR] Configuration error

    Configuration file not found: routestack.yaml

    hint: Create a routestack.yaml file in your project root
    hint: Use -c/--config to specify a different path
    hint: Set ROUTESTACK_CONFIG environment variable
    ");
}

#[test]
fn test_main_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["--help"], dir.path());
    assert!(output.status.success());

    let stdout = normalize_output(&String::from_utf8_lossy(&output.stdout));
    for command in ["deploy", "deploy-assets", "template", "describe"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
    assert!(stdout.contains("--log-level"));
    assert!(stdout.contains("--color"));
}

#[test]
fn test_deploy_help_lists_options() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["deploy", "--help"], dir.path());
    assert!(output.status.success());

    let stdout = normalize_output(&String::from_utf8_lossy(&output.stdout));
    for option in [
        "--config",
        "--stage",
        "--region",
        "--profile",
        "--function-name",
        "--skip-upload",
        "--danger-delete-resources",
        "--artifacts",
        "--yes",
    ] {
        assert!(stdout.contains(option), "deploy help should list {option}");
    }
}

#[test]
fn test_template_help_shows_default_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["template", "--help"], dir.path());
    assert!(output.status.success());

    let stdout = normalize_output(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("[default: routestack-out]"));
    assert!(stdout.contains("[default: routestack.yaml]"));
}
