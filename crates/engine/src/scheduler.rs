// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer and scheduling management

use std::collections::HashMap;
use std::time::{Duration, Instant};
use vigil_core::{Event, TimerId};

/// Pending one-shot timers keyed by id.
///
/// Setting a timer that already exists replaces its deadline. Nothing fires
/// on its own: the daemon loop polls [`Scheduler::fired_timers`] with the
/// current instant and routes the resulting events.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `id` to fire `duration` after `now`
    pub fn set_timer(&mut self, id: TimerId, duration: Duration, now: Instant) {
        self.timers.insert(id, now + duration);
    }

    /// Arm `id` to fire at an absolute instant
    pub fn set_timer_at(&mut self, id: TimerId, fires_at: Instant) {
        self.timers.insert(id, fires_at);
    }

    pub fn cancel_timer(&mut self, id: &str) {
        self.timers.remove(id);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn deadline(&self, id: &str) -> Option<Instant> {
        self.timers.get(id).copied()
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn fired_timers(&mut self, now: Instant) -> Vec<Event> {
        let mut due: Vec<(Instant, TimerId)> = self
            .timers
            .iter()
            .filter(|(_, fires_at)| **fires_at <= now)
            .map(|(id, fires_at)| (*fires_at, id.clone()))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));

        due.into_iter()
            .map(|(_, id)| {
                self.timers.remove(&id);
                Event::TimerStart { id }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
