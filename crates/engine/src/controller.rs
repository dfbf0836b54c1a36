// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle controller
//!
//! Owns the runtime state of every managed resource: status, the live
//! process handle, the generation of the current instance, the restart
//! budget and the output tail. All transitions happen under one lock that
//! is never held across an await; the generation token makes late exit and
//! output notifications from a superseded instance harmless.

use crate::cooldown::CooldownLedger;
use crate::error::{DeclineReason, RestartOutcome, SupervisorError};
use crate::readiness;
use crate::scheduler::Scheduler;
use crate::tail::OutputTail;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use vigil_adapters::{PortProbe, ProcessAdapter, ProcessHandle, SpawnRequest};
use vigil_core::{
    Clock, ControllerSettings, Event, Generation, ManagedResource, ResourceId, ResourceKind,
    ResourceStatus, StatusSnapshot, TimerId,
};

/// Narrow view of the controller used by the health reconciler.
#[async_trait]
pub trait ResourceControl: Send + Sync + 'static {
    fn status(&self, id: &ResourceId) -> StatusSnapshot;

    async fn start(&self, resource: &ManagedResource) -> Result<ResourceStatus, SupervisorError>;

    /// Stop and start again, keeping the crash-restart count.
    async fn recover(&self, resource: &ManagedResource)
        -> Result<ResourceStatus, SupervisorError>;
}

/// Adapter dependencies of the controller
pub struct ControllerDeps<P, Q> {
    pub process: P,
    pub ports: Q,
}

struct ResourceRuntime {
    resource: ManagedResource,
    status: ResourceStatus,
    generation: Generation,
    handle: Option<ProcessHandle>,
    port: Option<u16>,
    restart_count: u32,
    restart_pending: bool,
    output: OutputTail,
}

impl ResourceRuntime {
    fn new(resource: ManagedResource, tail_limit: usize) -> Self {
        Self {
            resource,
            status: ResourceStatus::NotConfigured,
            generation: Generation::default(),
            handle: None,
            port: None,
            restart_count: 0,
            restart_pending: false,
            output: OutputTail::new(tail_limit),
        }
    }
}

#[derive(Default)]
struct ControllerState {
    resources: HashMap<ResourceId, ResourceRuntime>,
    /// Never reused, even after a resource is stopped and removed
    last_generation: Generation,
    /// Set once by `shutdown`; no launch succeeds afterwards
    shutting_down: bool,
}

enum Attach {
    Attached(ResourceStatus),
    /// Exit already processed for this generation
    Finished(ResourceStatus),
    Superseded,
}

/// Starts, stops and restarts managed processes.
pub struct ProcessController<P, Q, C: Clock> {
    process: P,
    ports: Q,
    clock: C,
    settings: ControllerSettings,
    state: Mutex<ControllerState>,
    scheduler: Arc<Mutex<Scheduler>>,
    ledger: Arc<Mutex<CooldownLedger>>,
    event_tx: mpsc::Sender<Event>,
}

impl<P, Q, C> ProcessController<P, Q, C>
where
    P: ProcessAdapter,
    Q: PortProbe,
    C: Clock,
{
    pub fn new(
        deps: ControllerDeps<P, Q>,
        clock: C,
        settings: ControllerSettings,
        scheduler: Arc<Mutex<Scheduler>>,
        ledger: Arc<Mutex<CooldownLedger>>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            process: deps.process,
            ports: deps.ports,
            clock,
            settings,
            state: Mutex::new(ControllerState::default()),
            scheduler,
            ledger,
            event_tx,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Start the resource unless it is already active.
    ///
    /// Returns the status after the attempt: `Starting` (or `Running` for a
    /// daemon) when spawned, `External` when its port is already bound.
    pub async fn start(
        &self,
        resource: &ManagedResource,
    ) -> Result<ResourceStatus, SupervisorError> {
        self.launch(resource, None).await
    }

    /// Explicit restart: resets the crash-restart budget.
    pub async fn restart(
        &self,
        resource: &ManagedResource,
    ) -> Result<ResourceStatus, SupervisorError> {
        tracing::info!(resource_id = %resource.id, kind = %resource.kind, "manual restart");
        self.ledger
            .lock()
            .stamp(&resource.cooldown_key(), self.clock.now());
        self.stop(&resource.id).await;
        tokio::time::sleep(self.settings.port_release_delay).await;
        self.launch(resource, Some(0)).await
    }

    /// Automatic recovery: like [`restart`](Self::restart) but the
    /// crash-restart count carries over.
    pub async fn recover(
        &self,
        resource: &ManagedResource,
    ) -> Result<ResourceStatus, SupervisorError> {
        let restart_count = self
            .state
            .lock()
            .resources
            .get(&resource.id)
            .map_or(0, |rt| rt.restart_count);
        self.stop(&resource.id).await;
        tokio::time::sleep(self.settings.port_release_delay).await;
        self.launch(resource, Some(restart_count)).await
    }

    /// Kill the current instance and forget the resource.
    ///
    /// Returns false if it was not known. The exit event of the killed
    /// process arrives later and is ignored.
    pub async fn stop(&self, id: &ResourceId) -> bool {
        let removed = self.state.lock().resources.remove(id);
        self.scheduler
            .lock()
            .cancel_timer(TimerId::restart(id).as_str());

        let Some(rt) = removed else {
            return false;
        };
        if let Some(handle) = rt.handle {
            if let Err(e) = self.process.kill(&handle).await {
                tracing::debug!(resource_id = %id, error = %e, "kill failed (may already be gone)");
            }
        }
        tracing::info!(resource_id = %id, previous = %rt.status, "stopped");
        true
    }

    /// Start every resource; failures are logged and do not stop the rest.
    ///
    /// Returns how many resources are active afterwards.
    pub async fn start_all(&self, resources: &[ManagedResource]) -> usize {
        let mut active = 0;
        for resource in resources {
            match self.start(resource).await {
                Ok(status) if status.is_active() => active += 1,
                Ok(_) => {}
                Err(SupervisorError::NotConfigured(id)) => {
                    tracing::info!(resource_id = %id, "no command configured, leaving inert");
                }
                Err(e) => {
                    tracing::warn!(resource_id = %resource.id, error = %e, "failed to start");
                }
            }
        }
        active
    }

    /// Refuse further launches, then stop every known resource.
    ///
    /// A launch already past its spawn finds its entry gone and kills the
    /// orphan, so nothing is left running once this returns.
    pub async fn shutdown(&self) -> usize {
        self.state.lock().shutting_down = true;
        self.stop_all().await
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Stop every known resource. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<ResourceId> = self.state.lock().resources.keys().cloned().collect();
        let mut stopped = 0;
        for id in ids {
            if self.stop(&id).await {
                stopped += 1;
            }
        }
        stopped
    }

    pub fn status(&self, id: &ResourceId) -> StatusSnapshot {
        let state = self.state.lock();
        match state.resources.get(id) {
            Some(rt) => StatusSnapshot {
                status: rt.status,
                port: rt.port,
                pid: rt.handle.as_ref().and_then(|h| h.pid),
                restart_count: rt.restart_count,
                restart_pending: rt.restart_pending,
                recent_output: rt.output.last(self.settings.status_tail_bytes).to_string(),
            },
            None => StatusSnapshot::not_configured(),
        }
    }

    /// Snapshots of every known resource, ordered by id.
    pub fn statuses(&self) -> Vec<(ResourceId, StatusSnapshot)> {
        let mut ids: Vec<ResourceId> = self.state.lock().resources.keys().cloned().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| {
                let snapshot = self.status(&id);
                (id, snapshot)
            })
            .collect()
    }

    /// Full retained output of the current instance.
    pub fn output(&self, id: &ResourceId) -> Option<String> {
        self.state
            .lock()
            .resources
            .get(id)
            .map(|rt| rt.output.as_str().to_string())
    }

    /// Handle a chunk of process output.
    pub fn on_output(&self, id: &ResourceId, generation: Generation, chunk: &str) {
        let mut state = self.state.lock();
        let Some(rt) = state.resources.get_mut(id) else {
            return;
        };
        if rt.generation != generation {
            tracing::trace!(resource_id = %id, %generation, "output from superseded instance");
            return;
        }

        rt.output.push(chunk);
        if rt.port.is_none() {
            if let Some(port) = readiness::announced_port(chunk) {
                tracing::debug!(resource_id = %id, port, "observed port in output");
                rt.port = Some(port);
            }
        }
        if rt.status == ResourceStatus::Starting {
            if let Some(signature) = readiness::ready_signature(chunk) {
                rt.status = ResourceStatus::Running;
                tracing::info!(resource_id = %id, signature, port = ?rt.port, "ready");
            }
        }
    }

    /// Handle a process exit, scheduling a crash restart while budget remains.
    pub fn on_exit(&self, id: &ResourceId, generation: Generation, exit_code: Option<i32>) {
        let restart_delay = {
            let mut state = self.state.lock();
            let Some(rt) = state.resources.get_mut(id) else {
                tracing::debug!(resource_id = %id, %generation, "exit for stopped resource");
                return;
            };
            if rt.generation != generation {
                tracing::debug!(
                    resource_id = %id,
                    %generation,
                    current = %rt.generation,
                    "ignoring exit of superseded instance"
                );
                return;
            }

            rt.handle = None;
            let crashed = matches!(exit_code, Some(code) if code != 0);
            if crashed && rt.restart_count < self.settings.max_restarts {
                rt.restart_count += 1;
                rt.status = ResourceStatus::Stopped;
                rt.restart_pending = true;
                tracing::warn!(
                    resource_id = %id,
                    kind = %rt.resource.kind,
                    ?exit_code,
                    attempt = rt.restart_count,
                    max_restarts = self.settings.max_restarts,
                    "process crashed, scheduling restart"
                );
                Some(self.settings.restart_delay)
            } else if crashed {
                rt.status = ResourceStatus::Failed;
                tracing::error!(
                    resource_id = %id,
                    kind = %rt.resource.kind,
                    ?exit_code,
                    restarts = rt.restart_count,
                    "restart budget exhausted, giving up"
                );
                None
            } else {
                rt.status = ResourceStatus::Stopped;
                tracing::info!(resource_id = %id, ?exit_code, "process exited");
                None
            }
        };

        if let Some(delay) = restart_delay {
            self.scheduler
                .lock()
                .set_timer(TimerId::restart(id), delay, self.clock.now());
        }
    }

    /// Fire a scheduled crash restart, subject to the shared cooldown.
    pub async fn on_restart_timer(&self, id: &ResourceId) -> RestartOutcome {
        let resource = {
            let state = self.state.lock();
            match state.resources.get(id) {
                Some(rt) if rt.restart_pending => rt.resource.clone(),
                _ => return RestartOutcome::Skipped,
            }
        };

        let key = resource.cooldown_key();
        let now = self.clock.now();
        let declined = {
            let mut ledger = self.ledger.lock();
            if ledger.try_acquire(&key, now) {
                None
            } else {
                Some(ledger.remaining(&key, now))
            }
        };
        if let Some(remaining) = declined {
            let reason = DeclineReason::Cooldown { remaining };
            tracing::debug!(
                resource_id = %id,
                kind = %resource.kind,
                %reason,
                "crash restart declined, rescheduling"
            );
            self.scheduler
                .lock()
                .set_timer(TimerId::restart(id), remaining, now);
            return RestartOutcome::Declined { reason };
        }

        match self.launch(&resource, None).await {
            Ok(_) => RestartOutcome::Restarted,
            Err(e) => {
                tracing::warn!(resource_id = %id, error = %e, "crash restart failed");
                RestartOutcome::Failed
            }
        }
    }

    async fn launch(
        &self,
        resource: &ManagedResource,
        restart_count: Option<u32>,
    ) -> Result<ResourceStatus, SupervisorError> {
        let Some(command) = resource.command().map(str::to_string) else {
            tracing::debug!(resource_id = %resource.id, "no start command configured");
            return Err(SupervisorError::NotConfigured(resource.id.clone()));
        };

        let generation = {
            let mut state = self.state.lock();
            if state.shutting_down {
                tracing::debug!(resource_id = %resource.id, "shutting down, not launching");
                return Err(SupervisorError::ShuttingDown(resource.id.clone()));
            }
            if let Some(rt) = state.resources.get(&resource.id) {
                if rt.status.is_active() {
                    tracing::debug!(resource_id = %resource.id, status = %rt.status, "already active");
                    return Ok(rt.status);
                }
            }
            let generation = state.last_generation.next();
            state.last_generation = generation;

            let tail_limit = self.settings.output_tail_bytes;
            let rt = state
                .resources
                .entry(resource.id.clone())
                .or_insert_with(|| ResourceRuntime::new(resource.clone(), tail_limit));
            rt.resource = resource.clone();
            rt.status = ResourceStatus::Starting;
            rt.generation = generation;
            rt.handle = None;
            rt.port = None;
            rt.restart_pending = false;
            rt.output.clear();
            if let Some(count) = restart_count {
                rt.restart_count = count;
            }
            generation
        };
        self.scheduler
            .lock()
            .cancel_timer(TimerId::restart(&resource.id).as_str());

        let port = readiness::resolve_port(resource);
        if let Some(port) = port {
            if self.ports.in_use(port).await {
                tracing::info!(
                    resource_id = %resource.id,
                    port,
                    "port already in use, assuming an external instance"
                );
                let status = self.update_current(&resource.id, generation, |rt| {
                    rt.status = ResourceStatus::External;
                    rt.port = Some(port);
                });
                return Ok(status.unwrap_or(ResourceStatus::Stopped));
            }
        }

        let mut env = Vec::with_capacity(resource.env.len() + 1);
        if resource.kind == ResourceKind::DevServer {
            env.push(("FORCE_COLOR".to_string(), "1".to_string()));
        }
        env.extend(resource.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let request = SpawnRequest {
            resource_id: resource.id.clone(),
            generation,
            command,
            cwd: resource.working_dir.clone(),
            env,
        };

        let handle = match self.process.spawn(request, self.event_tx.clone()).await {
            Ok(handle) => handle,
            Err(source) => {
                self.update_current(&resource.id, generation, |rt| {
                    rt.status = ResourceStatus::Failed;
                });
                tracing::error!(
                    resource_id = %resource.id,
                    kind = %resource.kind,
                    error = %source,
                    "spawn failed, not scheduling a restart"
                );
                return Err(SupervisorError::Spawn {
                    resource_id: resource.id.clone(),
                    source,
                });
            }
        };

        let attach = {
            let mut state = self.state.lock();
            match state.resources.get_mut(&resource.id) {
                Some(rt) if rt.generation == generation && rt.status == ResourceStatus::Starting => {
                    rt.handle = Some(handle.clone());
                    rt.port = rt.port.or(port);
                    if resource.kind == ResourceKind::Daemon {
                        rt.status = ResourceStatus::Running;
                    }
                    Attach::Attached(rt.status)
                }
                Some(rt) if rt.generation == generation => Attach::Finished(rt.status),
                _ => Attach::Superseded,
            }
        };

        match attach {
            Attach::Attached(status) => {
                tracing::info!(
                    resource_id = %resource.id,
                    kind = %resource.kind,
                    %generation,
                    pid = ?handle.pid,
                    ?port,
                    "process started"
                );
                Ok(status)
            }
            Attach::Finished(status) => Ok(status),
            Attach::Superseded => {
                tracing::debug!(resource_id = %resource.id, %generation, "stopped while spawning");
                if let Err(e) = self.process.kill(&handle).await {
                    tracing::debug!(resource_id = %resource.id, error = %e, "kill of orphan failed");
                }
                Ok(ResourceStatus::Stopped)
            }
        }
    }

    /// Apply `f` if `generation` is still the current instance.
    fn update_current(
        &self,
        id: &ResourceId,
        generation: Generation,
        f: impl FnOnce(&mut ResourceRuntime),
    ) -> Option<ResourceStatus> {
        let mut state = self.state.lock();
        let rt = state.resources.get_mut(id)?;
        if rt.generation != generation {
            return None;
        }
        f(rt);
        Some(rt.status)
    }
}

#[async_trait]
impl<P, Q, C> ResourceControl for ProcessController<P, Q, C>
where
    P: ProcessAdapter,
    Q: PortProbe,
    C: Clock,
{
    fn status(&self, id: &ResourceId) -> StatusSnapshot {
        ProcessController::status(self, id)
    }

    async fn start(&self, resource: &ManagedResource) -> Result<ResourceStatus, SupervisorError> {
        ProcessController::start(self, resource).await
    }

    async fn recover(
        &self,
        resource: &ManagedResource,
    ) -> Result<ResourceStatus, SupervisorError> {
        ProcessController::recover(self, resource).await
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
