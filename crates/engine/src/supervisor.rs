// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor that owns every component and routes events to them

use crate::controller::{ControllerDeps, ProcessController};
use crate::cooldown::CooldownLedger;
use crate::heartbeat::Heartbeat;
use crate::reconciler::{HealthReconciler, ReconcileReport};
use crate::scheduler::Scheduler;
use crate::session::SessionMonitor;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vigil_adapters::{CapabilityProbe, HttpProbe, PortProbe, ProcessAdapter};
use vigil_core::{
    Clock, Event, ManagedResource, ResourceId, ResourceKind, SessionId, SupervisorConfig, TimerId,
    TimerKind,
};

/// Adapter dependencies of the supervisor
pub struct SupervisorDeps<P, Q, H, K> {
    pub process: P,
    pub ports: Q,
    pub http: H,
    pub capabilities: K,
}

/// What [`Supervisor::startup`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub started: usize,
    /// Daemons whose program was not found; neither started nor reconciled
    pub unavailable: Vec<ResourceId>,
}

/// What [`Supervisor::shutdown`] tore down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: usize,
    pub sessions: usize,
    pub connections: usize,
}

type Controller<P, Q, C> = ProcessController<P, Q, C>;
type Reconciler<P, Q, H, C> = HealthReconciler<Controller<P, Q, C>, H, C>;

pub struct Supervisor<P, Q, H, K, C: Clock> {
    clock: C,
    config: SupervisorConfig,
    resources: Vec<ManagedResource>,
    capabilities: K,
    scheduler: Arc<Mutex<Scheduler>>,
    controller: Arc<Controller<P, Q, C>>,
    reconciler: Arc<Reconciler<P, Q, H, C>>,
    heartbeat: Heartbeat<C>,
    sessions: SessionMonitor<C>,
    /// Background health pass, aborted on shutdown
    health_pass: Mutex<Option<JoinHandle<()>>>,
}

impl<P, Q, H, K, C> Supervisor<P, Q, H, K, C>
where
    P: ProcessAdapter,
    Q: PortProbe,
    H: HttpProbe,
    K: CapabilityProbe,
    C: Clock,
{
    pub fn new(
        deps: SupervisorDeps<P, Q, H, K>,
        clock: C,
        config: SupervisorConfig,
        resources: Vec<ManagedResource>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));
        let ledger = Arc::new(Mutex::new(CooldownLedger::new(
            config.health.restart_cooldown,
        )));
        let controller = Arc::new(ProcessController::new(
            ControllerDeps {
                process: deps.process,
                ports: deps.ports,
            },
            clock.clone(),
            config.controller.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&ledger),
            event_tx,
        ));
        let reconciler = Arc::new(HealthReconciler::new(
            Arc::clone(&controller),
            deps.http,
            clock.clone(),
            config.health.clone(),
            ledger,
        ));
        let heartbeat = Heartbeat::new(clock.clone(), config.heartbeat.clone());
        let sessions =
            SessionMonitor::new(clock.clone(), config.sessions.clone(), Arc::clone(&scheduler));

        Self {
            clock,
            config,
            resources,
            capabilities: deps.capabilities,
            scheduler,
            controller,
            reconciler,
            heartbeat,
            sessions,
            health_pass: Mutex::new(None),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Shared scheduler, polled by the daemon loop
    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn controller(&self) -> &Controller<P, Q, C> {
        &self.controller
    }

    pub fn reconciler(&self) -> &Reconciler<P, Q, H, C> {
        &self.reconciler
    }

    pub fn heartbeat(&self) -> &Heartbeat<C> {
        &self.heartbeat
    }

    pub fn sessions(&self) -> &SessionMonitor<C> {
        &self.sessions
    }

    /// Start every available resource and arm the periodic timers.
    pub async fn startup(&self) -> StartupReport {
        let mut report = StartupReport::default();
        let mut available = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            if resource.kind == ResourceKind::Daemon {
                if let Some(program) = resource.program() {
                    let capability = self.capabilities.lookup(program);
                    if !capability.available {
                        tracing::warn!(
                            resource_id = %resource.id,
                            program,
                            "daemon program not found, not managing it"
                        );
                        report.unavailable.push(resource.id.clone());
                        continue;
                    }
                }
            }
            available.push(resource.clone());
        }

        self.reconciler.set_resources(available.clone());
        report.started = self.controller.start_all(&available).await;

        let now = self.clock.now();
        let mut scheduler = self.scheduler.lock();
        scheduler.set_timer(TimerId::health_check(), self.config.health.initial_delay, now);
        scheduler.set_timer(TimerId::heartbeat(), self.config.heartbeat.ping_interval, now);
        drop(scheduler);

        tracing::info!(
            resources = self.resources.len(),
            started = report.started,
            unavailable = report.unavailable.len(),
            "supervisor started"
        );
        report
    }

    /// Route one event to the component that owns it.
    pub async fn handle_event(&self, event: Event) {
        match event {
            Event::ProcessOutput {
                resource_id,
                generation,
                chunk,
            } => self.controller.on_output(&resource_id, generation, &chunk),
            Event::ProcessExited {
                resource_id,
                generation,
                exit_code,
            } => self.controller.on_exit(&resource_id, generation, exit_code),
            Event::TimerStart { id } => self.handle_timer(&id).await,
            Event::Shutdown => {
                self.shutdown().await;
            }
        }
    }

    /// Fire every due timer. Returns how many fired.
    pub async fn tick(&self) -> usize {
        let fired = self.scheduler.lock().fired_timers(self.clock.now());
        let count = fired.len();
        for event in fired {
            self.handle_event(event).await;
        }
        count
    }

    async fn handle_timer(&self, id: &TimerId) {
        if self.controller.is_shutting_down() {
            tracing::debug!(timer_id = %id, "shutting down, ignoring timer");
            return;
        }
        match id.kind() {
            TimerKind::Restart(resource_id) => {
                let outcome = self
                    .controller
                    .on_restart_timer(&ResourceId::new(resource_id))
                    .await;
                tracing::debug!(resource_id, ?outcome, "restart timer handled");
            }
            TimerKind::HealthCheck => {
                self.rearm(TimerId::health_check(), self.config.health.interval);
                self.spawn_health_pass();
            }
            TimerKind::Heartbeat => {
                self.rearm(TimerId::heartbeat(), self.config.heartbeat.ping_interval);
                let report = self.heartbeat.sweep().await;
                if !report.terminated.is_empty() {
                    tracing::info!(terminated = report.terminated.len(), "heartbeat sweep");
                }
            }
            TimerKind::SessionTimeout(session_id) => {
                self.sessions.on_timeout_timer(&SessionId::new(session_id));
            }
            TimerKind::SessionProgress(session_id) => {
                self.sessions.on_progress_timer(&SessionId::new(session_id));
            }
            TimerKind::SessionStall(session_id) => {
                self.sessions.on_stall_timer(&SessionId::new(session_id));
            }
            TimerKind::Unknown => {
                tracing::debug!(timer_id = %id, "ignoring unknown timer");
            }
        }
    }

    /// Run one reconciliation pass inline.
    pub async fn run_health_checks(&self) -> Option<ReconcileReport> {
        self.reconciler.run_checks().await
    }

    fn spawn_health_pass(&self) {
        let mut pass = self.health_pass.lock();
        if pass.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("health check still in flight, skipping pass");
            return;
        }
        let reconciler = Arc::clone(&self.reconciler);
        *pass = Some(tokio::spawn(async move {
            reconciler.run_checks().await;
        }));
    }

    fn rearm(&self, id: TimerId, after: std::time::Duration) {
        self.scheduler.lock().set_timer(id, after, self.clock.now());
    }

    /// Stop all resources, end all sessions, drop all connections and
    /// cancel every timer.
    ///
    /// An in-flight health pass is aborted first so that a recovery waiting
    /// on the port release cannot launch anything afterwards.
    pub async fn shutdown(&self) -> ShutdownReport {
        let pass = self.health_pass.lock().take();
        if let Some(pass) = pass {
            pass.abort();
            if let Err(e) = pass.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "health pass ended abnormally");
                }
            }
        }

        let report = ShutdownReport {
            stopped: self.controller.shutdown().await,
            sessions: self.sessions.end_all(),
            connections: self.heartbeat.shutdown().await,
        };
        let timers = {
            let mut scheduler = self.scheduler.lock();
            let pending = scheduler.len();
            scheduler.clear();
            pending
        };
        tracing::info!(
            stopped = report.stopped,
            sessions = report.sessions,
            connections = report.connections,
            timers,
            "supervisor shut down"
        );
        report
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
