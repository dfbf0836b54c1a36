// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process spawning adapters

mod shell;

pub use shell::ShellProcessAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessAdapter, ProcessCall};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use vigil_core::{Event, Generation, ResourceId};

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("process not found: {0}")]
    NotFound(String),
    #[error("kill failed: {0}")]
    KillFailed(String),
}

/// Everything needed to start one process instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub resource_id: ResourceId,
    /// Tagged onto every event this instance emits.
    pub generation: Generation,
    /// Shell command line, run via `sh -c`.
    pub command: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Handle to a spawned process instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Adapter-assigned identifier, unique per spawn.
    pub id: String,
    pub pid: Option<u32>,
}

/// Adapter for starting and stopping external processes.
///
/// Implementations forward the merged output of the process as
/// [`Event::ProcessOutput`] and its termination as [`Event::ProcessExited`]
/// on `event_tx`, tagged with the request's resource id and generation.
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    /// Start the process. Errors mean it never ran.
    async fn spawn(
        &self,
        request: SpawnRequest,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<ProcessHandle, ProcessError>;

    /// Send a termination signal. The exit event still arrives asynchronously.
    async fn kill(&self, handle: &ProcessHandle) -> Result<(), ProcessError>;
}
