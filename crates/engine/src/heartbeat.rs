// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ping/pong watchdog over live connections

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use vigil_adapters::Connection;
use vigil_core::{Clock, ConnectionId, HeartbeatSettings};

struct Tracked {
    conn: Arc<dyn Connection>,
    alive: bool,
    last_pong: Instant,
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pinged: Vec<ConnectionId>,
    pub terminated: Vec<ConnectionId>,
    /// Already closed by the peer; dropped from bookkeeping
    pub dropped: Vec<ConnectionId>,
}

/// Terminates connections whose last pong is older than the pong timeout.
pub struct Heartbeat<C: Clock> {
    clock: C,
    settings: HeartbeatSettings,
    connections: Mutex<HashMap<ConnectionId, Tracked>>,
}

impl<C: Clock> Heartbeat<C> {
    pub fn new(clock: C, settings: HeartbeatSettings) -> Self {
        Self {
            clock,
            settings,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &HeartbeatSettings {
        &self.settings
    }

    /// Start tracking a connection; it counts as alive with a fresh pong.
    pub fn attach(&self, conn: Arc<dyn Connection>) {
        let id = conn.id().clone();
        tracing::debug!(connection_id = %id, "connection attached");
        self.connections.lock().insert(
            id,
            Tracked {
                conn,
                alive: true,
                last_pong: self.clock.now(),
            },
        );
    }

    /// Record a pong. Returns false for unknown connections.
    pub fn record_pong(&self, id: &ConnectionId) -> bool {
        match self.connections.lock().get_mut(id) {
            Some(tracked) => {
                tracked.alive = true;
                tracked.last_pong = self.clock.now();
                true
            }
            None => false,
        }
    }

    pub fn detach(&self, id: &ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    pub fn is_alive(&self, id: &ConnectionId) -> Option<bool> {
        self.connections.lock().get(id).map(|t| t.alive)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// One heartbeat interval: terminate stale connections, ping the rest.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut to_ping = Vec::new();
        let mut to_terminate = Vec::new();

        {
            let mut connections = self.connections.lock();
            connections.retain(|id, tracked| {
                if !tracked.conn.is_open() {
                    report.dropped.push(id.clone());
                    return false;
                }
                if now.saturating_duration_since(tracked.last_pong) > self.settings.pong_timeout {
                    to_terminate.push(Arc::clone(&tracked.conn));
                    return false;
                }
                tracked.alive = false;
                to_ping.push(Arc::clone(&tracked.conn));
                true
            });
        }

        for conn in to_terminate {
            tracing::info!(connection_id = %conn.id(), "no pong within timeout, terminating");
            conn.terminate().await;
            report.terminated.push(conn.id().clone());
        }
        for conn in to_ping {
            if let Err(e) = conn.ping().await {
                tracing::warn!(connection_id = %conn.id(), error = %e, "ping failed");
                continue;
            }
            report.pinged.push(conn.id().clone());
        }

        report.pinged.sort();
        report.terminated.sort();
        report.dropped.sort();
        report
    }

    /// Terminate and forget every connection.
    pub async fn shutdown(&self) -> usize {
        let all: Vec<Arc<dyn Connection>> = self
            .connections
            .lock()
            .drain()
            .map(|(_, tracked)| tracked.conn)
            .collect();
        for conn in &all {
            conn.terminate().await;
        }
        all.len()
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
