//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::{mpsc, Once};
use std::time::Duration;

/// How long a spawned daemon gets to print READY or to exit.
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);

static BUILD_ONCE: Once = Once::new();

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Returns the path to a binary, checking the llvm-cov target directory
/// first and building the daemon once if it is missing.
fn binary_path(name: &str) -> PathBuf {
    let root = workspace_root();
    let llvm_cov_path = root.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    // The test binary lives at target/debug/deps/specs-<hash>
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let sibling = debug_dir.join(name);
            if sibling.exists() {
                return sibling;
            }
        }
    }

    let standard = root.join("target/debug").join(name);
    if !standard.exists() {
        BUILD_ONCE.call_once(|| {
            let status = std::process::Command::new(env!("CARGO"))
                .args(["build", "-p", "vigil-daemon"])
                .current_dir(&root)
                .status()
                .expect("failed to invoke cargo build");
            assert!(status.success(), "cargo build -p vigil-daemon failed");
        });
    }
    standard
}

pub fn vigild_binary() -> PathBuf {
    binary_path("vigild")
}

/// `vigild` isolated to `state_dir`, with no inherited config override.
pub fn vigild(state_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(vigild_binary());
    cmd.env("VIGIL_STATE_DIR", state_dir)
        .env_remove("VIGIL_CONFIG")
        .env("VIGIL_TIMER_CHECK_MS", "50")
        .env("RUST_LOG", "info");
    cmd
}

/// A daemon running in the background until dropped.
pub struct RunningDaemon {
    child: Child,
}

impl RunningDaemon {
    /// Spawn vigild and wait until it reports READY.
    pub fn start(state_dir: &Path) -> Self {
        let mut child = std::process::Command::new(vigild_binary())
            .env("VIGIL_STATE_DIR", state_dir)
            .env_remove("VIGIL_CONFIG")
            .env("VIGIL_TIMER_CHECK_MS", "50")
            .env("RUST_LOG", "info")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn vigild");

        let stdout = child.stdout.take().expect("piped stdout");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if line.trim() == "READY" {
                    let _ = tx.send(());
                    return;
                }
            }
        });
        if rx.recv_timeout(SPEC_WAIT_MAX).is_err() {
            let _ = child.kill();
            panic!("vigild did not print READY");
        }
        Self { child }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send SIGTERM and wait for a clean exit.
    pub fn terminate(mut self) -> std::process::ExitStatus {
        let status = std::process::Command::new("kill")
            .args(["-TERM", &self.pid().to_string()])
            .status()
            .expect("failed to run kill");
        assert!(status.success());
        wait_with_timeout(&mut self.child, SPEC_WAIT_MAX)
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_with_timeout(child: &mut Child, max: Duration) -> std::process::ExitStatus {
    let start = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if start.elapsed() > max {
            panic!("vigild did not exit within {max:?}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Poll until `f` returns true or the wait budget runs out.
pub fn wait_for(mut f: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < SPEC_WAIT_MAX {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

pub fn read_log(state_dir: &Path) -> String {
    std::fs::read_to_string(state_dir.join("vigild.log")).unwrap_or_default()
}
