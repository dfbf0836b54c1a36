//! Daemon help and version specs
//!
//! Verify vigild --help, --version, and related flags work without
//! acquiring the daemon lock (no startup attempt).

use crate::prelude::*;
use yare::parameterized;

#[parameterized(
    long = { "--version" },
    short = { "-v" },
    capital = { "-V" },
)]
fn vigild_version_flags(flag: &str) {
    let dir = tempfile::tempdir().unwrap();
    let output = vigild(dir.path()).arg(flag).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(
        stdout.starts_with("vigild 0.1.0"),
        "expected version, got: {stdout}"
    );
    assert!(
        !dir.path().join("vigild.pid").exists(),
        "info flags must not take the lock"
    );
}

#[parameterized(
    long = { "--help" },
    short = { "-h" },
    subcommand = { "help" },
)]
fn vigild_help_shows_usage(flag: &str) {
    let dir = tempfile::tempdir().unwrap();
    let output = vigild(dir.path()).arg(flag).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("USAGE:"), "expected USAGE section, got: {stdout}");
    assert!(stdout.contains("--help"), "expected --help in output");
    assert!(stdout.contains("--version"), "expected --version in output");
}

#[test]
fn vigild_unknown_arg_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = vigild(dir.path()).arg("--bogus").assert().failure();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(
        stderr.contains("unexpected argument"),
        "expected error message, got: {stderr}"
    );
}
