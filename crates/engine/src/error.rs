// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error and outcome types for the supervision engine

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use vigil_adapters::{ProbeError, ProcessError};
use vigil_core::ResourceId;

/// Errors surfaced by controller operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The resource has no start command; it stays inert.
    #[error("resource {0} has no start command")]
    NotConfigured(ResourceId),
    /// The process never ran. No automatic restart follows.
    #[error("failed to spawn {resource_id}: {source}")]
    Spawn {
        resource_id: ResourceId,
        #[source]
        source: ProcessError,
    },
    /// Launch refused because the supervisor is tearing down.
    #[error("not launching {0}: shutting down")]
    ShuttingDown(ResourceId),
    #[error("probe failed for {resource_id}: {source}")]
    Probe {
        resource_id: ResourceId,
        #[source]
        source: ProbeError,
    },
}

/// Why a corrective action was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    /// Another restart for the same key ran within the cooldown window
    Cooldown { remaining: Duration },
    /// The port belongs to a process we did not spawn
    External,
    /// A crash restart is already scheduled
    RestartPending,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::Cooldown { remaining } => {
                write!(f, "cooldown ({}ms left)", remaining.as_millis())
            }
            DeclineReason::External => f.write_str("externally managed"),
            DeclineReason::RestartPending => f.write_str("restart already scheduled"),
        }
    }
}

/// Result of a restart request that is allowed to be declined.
///
/// A declined restart is policy, not failure, and is never an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    Restarted,
    Declined { reason: DeclineReason },
    /// Nothing to restart (stopped, superseded, or already running)
    Skipped,
    /// The launch was attempted and returned an error (already logged)
    Failed,
}
