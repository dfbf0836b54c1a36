// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier type for tracking scheduled timers.
//!
//! TimerId uniquely identifies a scheduled action such as a delayed crash
//! restart, a reconciliation tick, a heartbeat sweep, or one of a session's
//! timeout/progress/stall timers. The prefix encodes what fires.

use crate::id::{ResourceId, SessionId};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

const RESTART: &str = "restart:";
const SESSION_TIMEOUT: &str = "session-timeout:";
const SESSION_PROGRESS: &str = "session-progress:";
const SESSION_STALL: &str = "session-stall:";
const HEALTH_CHECK: &str = "health-check";
const HEARTBEAT: &str = "heartbeat";

/// Unique identifier for a timer instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub String);

/// Decoded form of a [`TimerId`], used when routing fired timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind<'a> {
    Restart(&'a str),
    HealthCheck,
    Heartbeat,
    SessionTimeout(&'a str),
    SessionProgress(&'a str),
    SessionStall(&'a str),
    Unknown,
}

impl TimerId {
    /// Create a new TimerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this TimerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Delayed automatic restart of a crashed resource.
    pub fn restart(resource_id: &ResourceId) -> Self {
        Self::new(format!("{RESTART}{resource_id}"))
    }

    /// Periodic health reconciliation pass.
    pub fn health_check() -> Self {
        Self::new(HEALTH_CHECK)
    }

    /// Periodic connection heartbeat sweep.
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT)
    }

    /// Absolute timeout of a supervised session.
    pub fn session_timeout(session_id: &SessionId) -> Self {
        Self::new(format!("{SESSION_TIMEOUT}{session_id}"))
    }

    /// Repeating progress report of a supervised session.
    pub fn session_progress(session_id: &SessionId) -> Self {
        Self::new(format!("{SESSION_PROGRESS}{session_id}"))
    }

    /// Idle-period stall check of a supervised session.
    pub fn session_stall(session_id: &SessionId) -> Self {
        Self::new(format!("{SESSION_STALL}{session_id}"))
    }

    /// All timers belonging to one session.
    pub fn for_session(session_id: &SessionId) -> [Self; 3] {
        [
            Self::session_timeout(session_id),
            Self::session_progress(session_id),
            Self::session_stall(session_id),
        ]
    }

    pub fn kind(&self) -> TimerKind<'_> {
        let s = self.0.as_str();
        if let Some(rest) = s.strip_prefix(RESTART) {
            TimerKind::Restart(rest)
        } else if let Some(rest) = s.strip_prefix(SESSION_TIMEOUT) {
            TimerKind::SessionTimeout(rest)
        } else if let Some(rest) = s.strip_prefix(SESSION_PROGRESS) {
            TimerKind::SessionProgress(rest)
        } else if let Some(rest) = s.strip_prefix(SESSION_STALL) {
            TimerKind::SessionStall(rest)
        } else if s == HEALTH_CHECK {
            TimerKind::HealthCheck
        } else if s == HEARTBEAT {
            TimerKind::Heartbeat
        } else {
            TimerKind::Unknown
        }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TimerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for TimerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TimerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for TimerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
