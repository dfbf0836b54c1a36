//! Daemon lifecycle specs
//!
//! Startup, single-instance locking, configuration errors and graceful
//! shutdown on SIGTERM.

use crate::prelude::*;

#[test]
fn malformed_config_fails_startup_and_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vigil.toml"), "[[resource]]\nid = 3\n").unwrap();

    vigild(dir.path()).assert().failure();

    let log = read_log(dir.path());
    assert!(
        log.contains("--- vigild: starting (pid: "),
        "expected startup marker, got: {log}"
    );
    assert!(
        log.contains("ERROR Failed to start daemon"),
        "expected startup error, got: {log}"
    );
}

#[test]
fn explicit_config_path_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("elsewhere.toml");
    std::fs::write(&config, "this is not toml").unwrap();

    vigild(dir.path())
        .env("VIGIL_CONFIG", &config)
        .assert()
        .failure();
}

#[test]
fn second_instance_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = RunningDaemon::start(dir.path());

    let output = vigild(dir.path()).assert().failure();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(
        stderr.contains("vigild is already running"),
        "expected lock refusal, got: {stderr}"
    );
    assert!(stderr.contains(&daemon.pid().to_string()));

    assert!(daemon.terminate().success());
}

#[test]
fn sigterm_stops_resources_and_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("started");
    std::fs::write(
        dir.path().join("vigil.toml"),
        format!(
            r#"
[[resource]]
id = "worker"
kind = "daemon"
cwd = "{cwd}"
command = "touch {marker} && sleep 30"
"#,
            cwd = dir.path().display(),
            marker = marker.display(),
        ),
    )
    .unwrap();

    let daemon = RunningDaemon::start(dir.path());
    assert!(wait_for(|| marker.exists()), "resource was not started");

    let status = daemon.terminate();
    assert!(status.success(), "expected clean exit, got {status:?}");
    assert!(!dir.path().join("vigild.pid").exists());

    let log = read_log(dir.path());
    assert!(log.contains("Received SIGTERM"), "log: {log}");
    assert!(log.contains("supervisor shut down"), "log: {log}");

    // The lock is free again
    let again = RunningDaemon::start(dir.path());
    assert!(again.terminate().success());
}
