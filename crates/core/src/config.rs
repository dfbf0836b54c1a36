// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration file model.
//!
//! ```toml
//! [controller]
//! max_restarts = 3
//! restart_delay = "3s"
//!
//! [health]
//! interval = "15s"
//!
//! [[resource]]
//! id = "web"
//! kind = "dev_server"
//! command = "npm run dev -- --port 5173"
//! cwd = "/srv/web"
//! ```
//!
//! Every section and field is optional; omitted values take the defaults below.

use crate::resource::ManagedResource;
use crate::time_fmt::duration_str;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate resource id: {0}")]
    DuplicateResource(String),
    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Restart policy and output buffering for the process controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub max_restarts: u32,
    #[serde(with = "duration_str")]
    pub restart_delay: Duration,
    /// Pause between stop and start on an explicit restart.
    #[serde(with = "duration_str")]
    pub port_release_delay: Duration,
    pub output_tail_bytes: usize,
    pub status_tail_bytes: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            restart_delay: Duration::from_secs(3),
            port_release_delay: Duration::from_secs(1),
            output_tail_bytes: 10_000,
            status_tail_bytes: 1_000,
        }
    }
}

/// Health reconciliation loop tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    #[serde(with = "duration_str")]
    pub interval: Duration,
    #[serde(with = "duration_str")]
    pub initial_delay: Duration,
    #[serde(with = "duration_str")]
    pub http_timeout: Duration,
    #[serde(with = "duration_str")]
    pub restart_cooldown: Duration,
    pub failure_threshold: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            initial_delay: Duration::from_secs(5),
            http_timeout: Duration::from_secs(5),
            restart_cooldown: Duration::from_secs(15),
            failure_threshold: 2,
        }
    }
}

/// Connection ping/pong watchdog tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    #[serde(with = "duration_str")]
    pub ping_interval: Duration,
    #[serde(with = "duration_str")]
    pub pong_timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(30),
        }
    }
}

/// Session anomaly detection tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    pub loop_threshold: usize,
    pub loop_window: usize,
    #[serde(with = "duration_str")]
    pub stall: Duration,
    #[serde(with = "duration_str")]
    pub progress_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            loop_threshold: 5,
            loop_window: 50,
            stall: Duration::from_secs(5 * 60),
            progress_interval: Duration::from_secs(30),
        }
    }
}

/// All supervisor tunables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub controller: ControllerSettings,
    pub health: HealthSettings,
    pub heartbeat: HeartbeatSettings,
    pub sessions: SessionSettings,
}

/// Parsed configuration file: tunables plus the managed resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub supervisor: SupervisorConfig,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ManagedResource>,
}

impl ConfigFile {
    /// Parse and validate TOML source.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let config: ConfigFile = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk. A missing file yields the defaults with no resources.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::parse(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.id.as_str()) {
                return Err(ConfigError::DuplicateResource(resource.id.to_string()));
            }
        }

        let sessions = &self.supervisor.sessions;
        if sessions.loop_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.loop_threshold",
                message: "must be at least 1".to_string(),
            });
        }
        if sessions.loop_window == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.loop_window",
                message: "must be at least 1".to_string(),
            });
        }
        if self.supervisor.health.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "health.failure_threshold",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
