// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::http::{HttpProbe, ProbeError};
use crate::process::{ProcessAdapter, ProcessError, ProcessHandle, SpawnRequest};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::Instrument;
use vigil_core::Event;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcess<P> {
    inner: P,
}

impl<P> TracedProcess<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ProcessAdapter> ProcessAdapter for TracedProcess<P> {
    async fn spawn(
        &self,
        request: SpawnRequest,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<ProcessHandle, ProcessError> {
        let span = tracing::info_span!(
            "process.spawn",
            resource_id = %request.resource_id,
            generation = %request.generation,
            cwd = %request.cwd.display()
        );
        async {
            tracing::info!(command = %request.command, env_count = request.env.len(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.spawn(request, event_tx).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(h) => tracing::info!(handle = %h.id, pid = ?h.pid, elapsed_ms, "process spawned"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn kill(&self, handle: &ProcessHandle) -> Result<(), ProcessError> {
        let result = self.inner.kill(handle).await;
        tracing::info_span!("process.kill", handle = %handle.id).in_scope(|| match &result {
            Ok(()) => tracing::info!("killed"),
            Err(e) => tracing::warn!(error = %e, "kill failed (may be expected)"),
        });
        result
    }
}

/// Wrapper that adds tracing to any HttpProbe
#[derive(Clone)]
pub struct TracedHttpProbe<H> {
    inner: H,
}

impl<H> TracedHttpProbe<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: HttpProbe> HttpProbe for TracedHttpProbe<H> {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        let start = std::time::Instant::now();
        let result = self.inner.get(url).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug_span!("http.probe", url).in_scope(|| match &result {
            Ok(status) => tracing::debug!(status, elapsed_ms, "probe answered"),
            Err(e) => tracing::debug!(elapsed_ms, error = %e, "probe failed"),
        });
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
