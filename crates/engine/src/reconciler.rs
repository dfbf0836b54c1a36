// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic health reconciliation
//!
//! Each pass compares what should be running with what the controller
//! reports and probes dev servers over HTTP. Corrective restarts go through
//! the shared cooldown ledger; probe failures are debounced by a per-resource
//! failure counter. Nothing in a pass is fatal: errors are logged and the
//! next resource is checked.

use crate::controller::ResourceControl;
use crate::cooldown::CooldownLedger;
use crate::error::{DeclineReason, SupervisorError};
use crate::readiness;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vigil_adapters::{HttpProbe, ProbeError};
use vigil_core::{
    Clock, HealthSettings, ManagedResource, ResourceId, ResourceKind, ResourceStatus,
    StatusSnapshot,
};

/// Probe health of one resource, as exposed to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeHealth {
    pub consecutive_failures: u32,
    /// `None` until the first probe completes.
    pub last_probe_ok: Option<bool>,
    /// Wall-clock epoch milliseconds of the last probe.
    pub last_checked_at: Option<u64>,
}

/// Why the reconciler acted on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    DaemonNotRunning,
    ProbeFailed,
    ResourceDown,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::DaemonNotRunning => "daemon_not_running",
            Trigger::ProbeFailed => "probe_failed",
            Trigger::ResourceDown => "resource_down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Started,
    Recovered,
    Declined(DeclineReason),
    /// The corrective call itself returned an error
    Errored(String),
}

/// One decision taken during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub trigger: Trigger,
    pub action: Action,
}

/// Everything a single pass decided, in resource order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub decisions: Vec<Decision>,
    pub probed: usize,
}

impl ReconcileReport {
    pub fn for_resource<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Decision> + 'a {
        self.decisions.iter().filter(move |d| d.resource_id == id)
    }
}

/// Resets the in-flight flag when a pass ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct HealthReconciler<R, H, C: Clock> {
    control: Arc<R>,
    http: H,
    clock: C,
    settings: HealthSettings,
    ledger: Arc<Mutex<CooldownLedger>>,
    resources: Mutex<Vec<ManagedResource>>,
    in_flight: AtomicBool,
    health: Mutex<HashMap<ResourceId, ProbeHealth>>,
}

impl<R, H, C> HealthReconciler<R, H, C>
where
    R: ResourceControl,
    H: HttpProbe,
    C: Clock,
{
    pub fn new(
        control: Arc<R>,
        http: H,
        clock: C,
        settings: HealthSettings,
        ledger: Arc<Mutex<CooldownLedger>>,
    ) -> Self {
        Self {
            control,
            http,
            clock,
            settings,
            ledger,
            resources: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            health: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the set of resources checked on each pass.
    pub fn set_resources(&self, resources: Vec<ManagedResource>) {
        let keep: Vec<ResourceId> = resources.iter().map(|r| r.id.clone()).collect();
        self.health.lock().retain(|id, _| keep.contains(id));
        *self.resources.lock() = resources;
    }

    pub fn health(&self, id: &ResourceId) -> Option<ProbeHealth> {
        self.health.lock().get(id).cloned()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one reconciliation pass.
    ///
    /// Returns `None` without doing anything if a previous pass is still in
    /// flight; overlapping passes are skipped, never queued.
    pub async fn run_checks(&self) -> Option<ReconcileReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("health check still in flight, skipping pass");
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        let resources = self.resources.lock().clone();
        let mut report = ReconcileReport::default();
        for resource in &resources {
            match resource.kind {
                ResourceKind::Daemon => self.check_daemon(resource, &mut report).await,
                ResourceKind::DevServer => self.check_dev_server(resource, &mut report).await,
            }
        }
        Some(report)
    }

    async fn check_daemon(&self, resource: &ManagedResource, report: &mut ReconcileReport) {
        let snapshot = self.control.status(&resource.id);
        // start() is a no-op for any active status
        if snapshot.status.is_active() {
            return;
        }
        if snapshot.restart_pending {
            self.decline(resource, Trigger::DaemonNotRunning, DeclineReason::RestartPending, report);
            return;
        }
        if let Err(reason) = self.acquire(resource) {
            self.decline(resource, Trigger::DaemonNotRunning, reason, report);
            return;
        }

        tracing::info!(
            resource_id = %resource.id,
            kind = %resource.kind,
            reason = Trigger::DaemonNotRunning.as_str(),
            status = %snapshot.status,
            "starting daemon"
        );
        let result = self.control.start(resource).await;
        self.record(resource, Trigger::DaemonNotRunning, Action::Started, result, report);
    }

    async fn check_dev_server(&self, resource: &ManagedResource, report: &mut ReconcileReport) {
        let snapshot = self.control.status(&resource.id);
        if snapshot.status == ResourceStatus::NotConfigured {
            // Never started or deliberately stopped
            return;
        }

        // Probed in every state; the failure threshold absorbs slow startups
        if let Some(url) = readiness::probe_url(resource, snapshot.port) {
            report.probed += 1;
            let ok = self.probe(resource, &url).await;
            self.after_probe(resource, &snapshot, ok, report).await;
        }

        let snapshot = self.control.status(&resource.id);
        if snapshot.status.is_down() {
            if snapshot.restart_pending {
                self.decline(resource, Trigger::ResourceDown, DeclineReason::RestartPending, report);
                return;
            }
            if let Err(reason) = self.acquire(resource) {
                self.decline(resource, Trigger::ResourceDown, reason, report);
                return;
            }
            tracing::info!(
                resource_id = %resource.id,
                kind = %resource.kind,
                reason = Trigger::ResourceDown.as_str(),
                status = %snapshot.status,
                "recovering"
            );
            self.reset_failures(&resource.id);
            let result = self.control.recover(resource).await;
            self.record(resource, Trigger::ResourceDown, Action::Recovered, result, report);
        }
    }

    /// Issue one bounded probe. Timeouts and errors are failures.
    async fn probe(&self, resource: &ManagedResource, url: &str) -> bool {
        let outcome = tokio::time::timeout(self.settings.http_timeout, self.http.get(url)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.settings.http_timeout)),
        };
        match result {
            Ok(status) => {
                tracing::trace!(resource_id = %resource.id, url, status, "probe ok");
                true
            }
            Err(source) => {
                let err = SupervisorError::Probe {
                    resource_id: resource.id.clone(),
                    source,
                };
                tracing::info!(resource_id = %resource.id, url, error = %err, "probe failed");
                false
            }
        }
    }

    async fn after_probe(
        &self,
        resource: &ManagedResource,
        snapshot: &StatusSnapshot,
        ok: bool,
        report: &mut ReconcileReport,
    ) {
        let failures = {
            let mut health = self.health.lock();
            let entry = health.entry(resource.id.clone()).or_default();
            entry.last_probe_ok = Some(ok);
            entry.last_checked_at = Some(self.clock.epoch_ms());
            if ok {
                entry.consecutive_failures = 0;
                return;
            }
            entry.consecutive_failures += 1;
            entry.consecutive_failures
        };
        if failures < self.settings.failure_threshold {
            return;
        }

        if snapshot.status == ResourceStatus::External {
            tracing::info!(
                resource_id = %resource.id,
                kind = %resource.kind,
                reason = Trigger::ProbeFailed.as_str(),
                failures,
                "external instance unhealthy, not restarting"
            );
            self.reset_failures(&resource.id);
            self.decline(resource, Trigger::ProbeFailed, DeclineReason::External, report);
            return;
        }

        if snapshot.restart_pending {
            self.decline(resource, Trigger::ProbeFailed, DeclineReason::RestartPending, report);
            return;
        }
        if let Err(reason) = self.acquire(resource) {
            self.decline(resource, Trigger::ProbeFailed, reason, report);
            return;
        }
        tracing::warn!(
            resource_id = %resource.id,
            kind = %resource.kind,
            reason = Trigger::ProbeFailed.as_str(),
            failures,
            "unresponsive, restarting"
        );
        self.reset_failures(&resource.id);
        let result = self.control.recover(resource).await;
        self.record(resource, Trigger::ProbeFailed, Action::Recovered, result, report);
    }

    fn reset_failures(&self, id: &ResourceId) {
        if let Some(entry) = self.health.lock().get_mut(id) {
            entry.consecutive_failures = 0;
        }
    }

    /// Stamp the cooldown for this resource, or say how long is left.
    fn acquire(&self, resource: &ManagedResource) -> Result<(), DeclineReason> {
        let key = resource.cooldown_key();
        let now = self.clock.now();
        let mut ledger = self.ledger.lock();
        if ledger.try_acquire(&key, now) {
            Ok(())
        } else {
            Err(DeclineReason::Cooldown {
                remaining: ledger.remaining(&key, now),
            })
        }
    }

    fn decline(
        &self,
        resource: &ManagedResource,
        trigger: Trigger,
        reason: DeclineReason,
        report: &mut ReconcileReport,
    ) {
        tracing::debug!(
            resource_id = %resource.id,
            kind = %resource.kind,
            reason = trigger.as_str(),
            declined = %reason,
            "corrective action declined"
        );
        report.decisions.push(Decision {
            resource_id: resource.id.clone(),
            kind: resource.kind,
            trigger,
            action: Action::Declined(reason),
        });
    }

    fn record(
        &self,
        resource: &ManagedResource,
        trigger: Trigger,
        action: Action,
        result: Result<ResourceStatus, SupervisorError>,
        report: &mut ReconcileReport,
    ) {
        let action = match result {
            Ok(_) => action,
            Err(e) => {
                tracing::warn!(
                    resource_id = %resource.id,
                    kind = %resource.kind,
                    reason = trigger.as_str(),
                    error = %e,
                    "corrective action failed"
                );
                Action::Errored(e.to_string())
            }
        };
        report.decisions.push(Decision {
            resource_id: resource.id.clone(),
            kind: resource.kind,
            trigger,
            action,
        });
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
