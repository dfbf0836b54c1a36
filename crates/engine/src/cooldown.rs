// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key cooldown between corrective actions

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last restart attempt per `"<kind>:<id>"` key.
///
/// Shared by every path that can restart a resource, so at most one restart
/// executes per key within one cooldown window no matter who asks.
#[derive(Debug)]
pub struct CooldownLedger {
    cooldown: Duration,
    stamps: HashMap<String, Instant>,
}

impl CooldownLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            stamps: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Stamp `key` and return true if its cooldown has elapsed.
    ///
    /// The stamp is taken before the action runs so a concurrent caller
    /// for the same key is declined.
    pub fn try_acquire(&mut self, key: &str, now: Instant) -> bool {
        if self.remaining(key, now).is_zero() {
            self.stamps.insert(key.to_string(), now);
            true
        } else {
            false
        }
    }

    /// Stamp unconditionally (manual restarts).
    pub fn stamp(&mut self, key: &str, now: Instant) {
        self.stamps.insert(key.to_string(), now);
    }

    /// Time left before `key` may act again; zero when it may act now.
    pub fn remaining(&self, key: &str, now: Instant) -> Duration {
        match self.stamps.get(key) {
            Some(last) => (*last + self.cooldown).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    pub fn last_attempt(&self, key: &str) -> Option<Instant> {
        self.stamps.get(key).copied()
    }

    pub fn forget(&mut self, key: &str) {
        self.stamps.remove(key);
    }
}

#[cfg(test)]
#[path = "cooldown_tests.rs"]
mod tests;
