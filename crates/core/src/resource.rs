// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed resource descriptors and runtime status types.
//!
//! A resource is one externally spawned process the supervisor keeps alive:
//! a per-project dev server or a background daemon. Descriptors are
//! immutable once loaded; runtime state lives in the process controller.

use crate::id::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// What kind of process a resource runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// HTTP-serving development server; probed over HTTP, ready on output signature.
    DevServer,
    /// Background daemon; considered running as soon as it is spawned.
    Daemon,
}

impl ResourceKind {
    /// Prefix used for cooldown keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::DevServer => "devserver",
            ResourceKind::Daemon => "daemon",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    /// Shell command line; `None` leaves the resource inert (NotConfigured).
    #[serde(default, rename = "command")]
    pub start_command: Option<String>,
    #[serde(rename = "cwd")]
    pub working_dir: PathBuf,
    /// Explicit liveness probe URL, overriding the one derived from the port.
    #[serde(default)]
    pub probe_url: Option<String>,
    /// Extra environment variables for the spawned process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ManagedResource {
    pub fn new(id: impl Into<ResourceId>, kind: ResourceKind, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind,
            start_command: None,
            working_dir: working_dir.into(),
            probe_url: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.start_command = Some(command.into());
        self
    }

    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Non-empty start command, if configured.
    pub fn command(&self) -> Option<&str> {
        self.start_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// First word of the command that is not an `VAR=value` assignment.
    pub fn program(&self) -> Option<&str> {
        self.command()?
            .split_whitespace()
            .find(|word| !is_env_assignment(word))
    }

    /// Cooldown ledger key: `"<kind>:<id>"`.
    pub fn cooldown_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Monotonic instance counter assigned at every start.
///
/// Exit and output notifications carry the generation of the instance that
/// produced them; anything older than the current generation is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// No command configured, or never started.
    NotConfigured,
    /// Spawned, waiting for a readiness signature.
    Starting,
    /// Serving.
    Running,
    /// Port already bound by another process; not spawned by us.
    External,
    /// Exited cleanly, was killed, or awaits a scheduled restart.
    Stopped,
    /// Restart budget exhausted or spawn failed.
    Failed,
}

impl ResourceStatus {
    /// Alive from the supervisor's point of view: `start` is a no-op.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ResourceStatus::Starting | ResourceStatus::Running | ResourceStatus::External
        )
    }

    /// Down and eligible for reconciliation.
    pub fn is_down(&self) -> bool {
        matches!(self, ResourceStatus::Stopped | ResourceStatus::Failed)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::NotConfigured => "not_configured",
            ResourceStatus::Starting => "starting",
            ResourceStatus::Running => "running",
            ResourceStatus::External => "external",
            ResourceStatus::Stopped => "stopped",
            ResourceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Read-only view of a resource's runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub restart_count: u32,
    /// True while a crash restart is scheduled but has not fired yet.
    #[serde(default)]
    pub restart_pending: bool,
    /// Last ~1 KB of output, for diagnostics.
    #[serde(default)]
    pub recent_output: String,
}

impl StatusSnapshot {
    pub fn not_configured() -> Self {
        Self {
            status: ResourceStatus::NotConfigured,
            port: None,
            pid: None,
            restart_count: 0,
            restart_pending: false,
            recent_output: String::new(),
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
