// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProcessAdapter, ProcessError, ProcessHandle, SpawnRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use vigil_core::Event;

/// Recorded process call
#[derive(Debug, Clone)]
pub enum ProcessCall {
    Spawn { request: SpawnRequest },
    Kill { handle_id: String },
}

struct FakeProcessState {
    calls: Vec<ProcessCall>,
    live: HashMap<String, SpawnRequest>,
    failing_commands: HashSet<String>,
    next_id: u64,
}

/// Fake process adapter for testing.
///
/// Spawns nothing; tests drive output and exits by feeding events to the
/// code under test directly.
#[derive(Clone)]
pub struct FakeProcessAdapter {
    inner: Arc<Mutex<FakeProcessState>>,
}

impl Default for FakeProcessAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProcessState {
                calls: Vec::new(),
                live: HashMap::new(),
                failing_commands: HashSet::new(),
                next_id: 0,
            })),
        }
    }
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.inner.lock().calls.clone()
    }

    /// All spawn requests, in order
    pub fn spawns(&self) -> Vec<SpawnRequest> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ProcessCall::Spawn { request } => Some(request.clone()),
                ProcessCall::Kill { .. } => None,
            })
            .collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns().len()
    }

    /// Handle ids passed to `kill`, in order
    pub fn kills(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ProcessCall::Kill { handle_id } => Some(handle_id.clone()),
                ProcessCall::Spawn { .. } => None,
            })
            .collect()
    }

    /// Make spawns of this exact command fail
    pub fn fail_spawn(&self, command: &str) {
        self.inner.lock().failing_commands.insert(command.to_string());
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    async fn spawn(
        &self,
        request: SpawnRequest,
        _event_tx: mpsc::Sender<Event>,
    ) -> Result<ProcessHandle, ProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProcessCall::Spawn {
            request: request.clone(),
        });

        if inner.failing_commands.contains(&request.command) {
            return Err(ProcessError::SpawnFailed(format!(
                "{}: No such file or directory",
                request.command
            )));
        }

        inner.next_id += 1;
        let id = format!("fake-{}", inner.next_id);
        let pid = 1000 + inner.next_id as u32;
        inner.live.insert(id.clone(), request);

        Ok(ProcessHandle { id, pid: Some(pid) })
    }

    async fn kill(&self, handle: &ProcessHandle) -> Result<(), ProcessError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProcessCall::Kill {
            handle_id: handle.id.clone(),
        });
        match inner.live.remove(&handle.id) {
            Some(_) => Ok(()),
            None => Err(ProcessError::NotFound(handle.id.clone())),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
