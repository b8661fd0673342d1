//! Integration tests for wgsteer.
//!
//! Binary-level tests exercise the CLI surface; pipeline tests exercise
//! the library against temp files. Nothing here touches real OS
//! networking state.

use std::path::PathBuf;
use std::process::Command;

use wgsteer::combiner::{self, PrefixSet};
use wgsteer::lists;

/// Helper to get the path to the compiled binary
fn get_binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps directory
    path.push("wgsteer");
    path
}

/// Run wgsteer and return output
fn run_wgsteer(args: &[&str]) -> std::process::Output {
    Command::new(get_binary_path())
        .args(args)
        .output()
        .expect("Failed to execute wgsteer")
}

#[test]
fn test_version_command() {
    let output = run_wgsteer(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("wgsteer"));
}

#[test]
fn test_help_command() {
    let output = run_wgsteer(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("routes"));
    assert!(stdout.contains("ipset"));
    assert!(stdout.contains("check"));
}

#[test]
fn test_check_invalid_ip_fails() {
    let output = run_wgsteer(&["check", "not-an-ip"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid"));
}

#[test]
fn test_diagnose_invalid_target_fails() {
    let output = run_wgsteer(&["diagnose", "--target", "bananas"]);
    assert!(!output.status.success());
}

#[test]
fn test_bad_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "cutoff_prefix: 99\n").unwrap();

    let output = run_wgsteer(&["--config", config.to_str().unwrap(), "ipset", "--dry-run"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cutoff_prefix"));
}

#[test]
fn test_malformed_exclude_aborts_before_apply() {
    // A parse error in an override list must surface in the loading
    // stage, before anything could touch OS state.
    let dir = tempfile::tempdir().unwrap();
    let exclude = dir.path().join("exclude.txt");
    std::fs::write(&exclude, "10.0.0.0/24\nnot-an-ip\n").unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, format!("exclude_file: {}\n", exclude.display())).unwrap();

    let output = run_wgsteer(&["--config", config.to_str().unwrap(), "routes", "--dry-run"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not-an-ip"), "stderr: {stderr}");
    assert!(stderr.contains("exclude.txt:2"), "stderr: {stderr}");
}

// -- library-level pipeline scenarios over temp files ---------------------

fn load(dir: &tempfile::TempDir, name: &str, content: &str) -> PrefixSet {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    lists::load_prefix_file(&path).unwrap()
}

#[test]
fn test_combine_from_files_spec_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let include = load(&dir, "include.txt", "10.0.0.0/24\n");
    let exclude = load(
        &dir,
        "exclude.txt",
        "# carve out the gateway block\n10.0.0.0/28\n",
    );
    let resolved: PrefixSet = ["10.0.0.0/24", "192.168.0.0/16"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

    let final_set = combiner::combine(&resolved, &include, &exclude);

    let excluded: ipnet::IpNet = "10.0.0.0/28".parse().unwrap();
    assert!(final_set.iter().any(|n| n.to_string() == "192.168.0.0/16"));
    assert!(!final_set
        .iter()
        .any(|n| combiner::covers(n, &excluded) || combiner::covers(&excluded, n)));
    // The rest of 10.0.0.0/24 stays covered.
    let remainder: ipnet::IpNet = "10.0.0.128/25".parse().unwrap();
    assert!(final_set.iter().any(|n| combiner::covers(n, &remainder)));
}

#[test]
fn test_combine_from_files_empty_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let include = load(&dir, "include.txt", "");
    let exclude = load(&dir, "exclude.txt", "# nothing here\n\n");
    let resolved: PrefixSet = ["172.16.0.0/12", "203.0.113.0/24"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

    let final_set = combiner::combine(&resolved, &include, &exclude);
    let expected: Vec<ipnet::IpNet> = resolved.iter().cloned().collect();
    assert_eq!(final_set, expected);
}

#[test]
fn test_missing_override_files_are_empty_sets() {
    let dir = tempfile::tempdir().unwrap();
    let include = lists::load_prefix_file(&dir.path().join("include.txt")).unwrap();
    let exclude = lists::load_prefix_file(&dir.path().join("exclude.txt")).unwrap();
    assert!(include.is_empty());
    assert!(exclude.is_empty());
}
