// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vigil_adapters::{
    ProbeError, ReqwestHttpProbe, ShellProcessAdapter, TcpPortProbe, TracedHttpProbe,
    TracedProcess, WhichCapabilityProbe,
};
use vigil_core::{ConfigError, ConfigFile, Event, SystemClock};
use vigil_engine::{StartupReport, Supervisor, SupervisorDeps};

use crate::env;

/// Capacity of the channel carrying process output and exits
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Supervisor with concrete adapter types (wrapped with tracing)
pub type DaemonSupervisor = Supervisor<
    TracedProcess<ShellProcessAdapter>,
    TcpPortProbe,
    TracedHttpProbe<ReqwestHttpProbe>,
    WhichCapabilityProbe,
    SystemClock,
>;

/// Daemon paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/vigil)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the supervisor configuration file
    pub config_path: PathBuf,
}

impl Config {
    /// Resolve paths from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self::for_state_dir(state_dir, env::config_path()))
    }

    pub fn for_state_dir(state_dir: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            lock_path: state_dir.join("vigild.pid"),
            log_path: state_dir.join("vigild.log"),
            config_path: config_path.unwrap_or_else(|| state_dir.join("vigil.toml")),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] ProbeError),
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub supervisor: DaemonSupervisor,
    /// Process output and exit events from spawned resources
    pub event_rx: mpsc::Receiver<Event>,
    pub start_time: Instant,
    pub startup: StartupReport,
}

impl DaemonState {
    /// Stop everything the supervisor owns and remove the PID file.
    pub async fn shutdown(&mut self) {
        info!("Shutting down daemon...");
        self.supervisor.shutdown().await;

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }
        // Lock is released when self.lock_file is dropped
        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
    }
}

/// Take the exclusive daemon lock and record our PID in it.
pub fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Do not truncate before holding the lock: that would wipe the running
    // daemon's PID.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Start the daemon: lock, load configuration, start managed resources.
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let lock_file = acquire_lock(&config.lock_path)?;

    let file = ConfigFile::load(&config.config_path)?;
    info!(
        path = %config.config_path.display(),
        resources = file.resources.len(),
        "loaded configuration"
    );

    let http = ReqwestHttpProbe::new(file.supervisor.health.http_timeout)?;
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let supervisor = Supervisor::new(
        SupervisorDeps {
            process: TracedProcess::new(ShellProcessAdapter::new()),
            ports: TcpPortProbe::new(),
            http: TracedHttpProbe::new(http),
            capabilities: WhichCapabilityProbe::new(),
        },
        SystemClock,
        file.supervisor,
        file.resources,
        event_tx,
    );
    let startup = supervisor.startup().await;

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        supervisor,
        event_rx,
        start_time: Instant::now(),
        startup,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
