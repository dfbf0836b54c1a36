// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session anomaly detection
//!
//! Watches the output of long-running interactive sessions for repeated
//! patterns, absolute timeouts and idle stalls. Timers live in the shared
//! [`Scheduler`]; the supervisor routes fired session timers back here.
//! Observer callbacks always run after the session lock is released.

use crate::patterns::{self, PatternToken};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_core::{format_duration, format_elapsed, Clock, SessionId, SessionSettings, TimerId};

/// Fewer recorded tokens than this always score zero suspicion.
const MIN_TOKENS_FOR_SUSPICION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    Timeout,
    TimeoutExtended,
}

impl TimeoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutReason::Timeout => "timeout",
            TimeoutReason::TimeoutExtended => "timeout_extended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutReport {
    pub elapsed: Duration,
    pub reason: TimeoutReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub pattern: String,
    pub count: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub elapsed: Duration,
    pub since_activity: Duration,
    pub output_size: usize,
    pub loop_suspicion: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallReport {
    pub elapsed: Duration,
    pub since_activity: Duration,
}

/// Snapshot returned by [`SessionMonitor::stats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub elapsed: Duration,
    pub since_activity: Duration,
    pub output_size: usize,
    pub loop_suspicion: u8,
    /// Highest count alerted so far per pattern
    pub pattern_counts: BTreeMap<String, usize>,
}

/// Receives anomaly notifications for one session.
pub trait SessionObserver: Send + Sync + 'static {
    fn on_timeout(&self, report: TimeoutReport);

    fn on_loop_detected(&self, report: LoopReport);

    fn on_progress(&self, report: ProgressReport);

    fn on_stall(&self, _report: StallReport) {}
}

struct SessionState {
    started_at: Instant,
    last_activity: Instant,
    tokens: VecDeque<String>,
    alerted: HashMap<String, usize>,
    /// Set once `extend_timeout` has been used
    extended: bool,
    observer: Arc<dyn SessionObserver>,
}

impl SessionState {
    fn window(&self, size: usize) -> impl Iterator<Item = &String> {
        self.tokens.iter().skip(self.tokens.len().saturating_sub(size))
    }

    fn window_counts(&self, size: usize) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for token in self.window(size) {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
        counts
    }

    fn output_size(&self) -> usize {
        self.tokens.iter().map(|t| t.chars().count()).sum()
    }

    fn loop_suspicion(&self, settings: &SessionSettings) -> u8 {
        if self.tokens.len() < MIN_TOKENS_FOR_SUSPICION {
            return 0;
        }
        let max = self
            .window_counts(settings.loop_window)
            .into_values()
            .max()
            .unwrap_or(0);
        let score = (max as f64 / settings.loop_threshold as f64 * 50.0).round();
        score.min(100.0) as u8
    }

    fn progress(&self, now: Instant, settings: &SessionSettings) -> ProgressReport {
        ProgressReport {
            elapsed: now.saturating_duration_since(self.started_at),
            since_activity: now.saturating_duration_since(self.last_activity),
            output_size: self.output_size(),
            loop_suspicion: self.loop_suspicion(settings),
        }
    }
}

pub struct SessionMonitor<C: Clock> {
    clock: C,
    settings: SessionSettings,
    scheduler: Arc<Mutex<Scheduler>>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl<C: Clock> SessionMonitor<C> {
    pub fn new(clock: C, settings: SessionSettings, scheduler: Arc<Mutex<Scheduler>>) -> Self {
        Self {
            clock,
            settings,
            scheduler,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Begin watching a session and arm its timeout, progress and stall
    /// timers. Starting an id that is already watched replaces it.
    pub fn start_session(&self, id: SessionId, observer: Arc<dyn SessionObserver>) {
        let now = self.clock.now();
        let [timeout, progress, stall] = TimerId::for_session(&id);
        {
            let mut scheduler = self.scheduler.lock();
            scheduler.set_timer(timeout, self.settings.timeout, now);
            scheduler.set_timer(progress, self.settings.progress_interval, now);
            scheduler.set_timer(stall, self.settings.stall, now);
        }
        tracing::info!(
            session_id = %id,
            timeout = %format_duration(self.settings.timeout),
            "session monitoring started"
        );
        self.sessions.lock().insert(
            id,
            SessionState {
                started_at: now,
                last_activity: now,
                tokens: VecDeque::new(),
                alerted: HashMap::new(),
                extended: false,
                observer,
            },
        );
    }

    /// Feed one chunk of session output.
    ///
    /// Returns the token the chunk was reduced to, if any. Unknown or ended
    /// sessions are ignored.
    pub fn record_output(&self, id: &SessionId, chunk: &str) -> Option<PatternToken> {
        let now = self.clock.now();
        let (token, alerts, observer) = {
            let mut sessions = self.sessions.lock();
            let state = sessions.get_mut(id)?;
            state.last_activity = now;
            self.scheduler
                .lock()
                .set_timer(TimerId::session_stall(id), self.settings.stall, now);

            let token = patterns::classify(chunk)?;
            state.tokens.push_back(token.to_string());
            let window = self.settings.loop_window;
            if state.tokens.len() > window * 2 {
                let excess = state.tokens.len() - window;
                state.tokens.drain(..excess);
            }

            let elapsed = now.saturating_duration_since(state.started_at);
            let mut alerts: Vec<LoopReport> = state
                .window_counts(window)
                .into_iter()
                .filter(|(pattern, count)| {
                    *count >= self.settings.loop_threshold
                        && state.alerted.get(*pattern).is_none_or(|seen| seen < count)
                })
                .map(|(pattern, count)| LoopReport {
                    pattern: pattern.to_string(),
                    count,
                    elapsed,
                })
                .collect();
            alerts.sort_by(|a, b| a.pattern.cmp(&b.pattern));
            for alert in &alerts {
                state.alerted.insert(alert.pattern.clone(), alert.count);
            }
            (token, alerts, Arc::clone(&state.observer))
        };

        for alert in alerts {
            tracing::warn!(
                session_id = %id,
                pattern = %alert.pattern,
                count = alert.count,
                "loop detected"
            );
            observer.on_loop_detected(alert);
        }
        Some(token)
    }

    /// Move the deadline to the original one (session start plus the
    /// configured timeout) pushed later by `extra`.
    ///
    /// Each call is measured from the original deadline, so a later call
    /// replaces an earlier extension rather than adding to it. A deadline
    /// already in the past fires on the next tick. Returns false if the
    /// session is not being watched.
    pub fn extend_timeout(&self, id: &SessionId, extra: Duration) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let Some(state) = sessions.get_mut(id) else {
            return false;
        };
        state.extended = true;
        let deadline = (state.started_at + self.settings.timeout + extra).max(now);
        self.scheduler
            .lock()
            .set_timer_at(TimerId::session_timeout(id), deadline);
        tracing::info!(
            session_id = %id,
            extended_by = %format_duration(extra),
            "session timeout extended"
        );
        true
    }

    /// Stop watching a session and cancel its timers. Idempotent.
    pub fn end_session(&self, id: &SessionId) -> bool {
        let Some(state) = self.sessions.lock().remove(id) else {
            return false;
        };
        {
            let mut scheduler = self.scheduler.lock();
            for timer in TimerId::for_session(id) {
                scheduler.cancel_timer(timer.as_str());
            }
        }
        let elapsed = self.clock.now().saturating_duration_since(state.started_at);
        tracing::info!(
            session_id = %id,
            duration = %format_elapsed(elapsed.as_secs()),
            "session ended"
        );
        true
    }

    /// End every session (shutdown). Returns how many were ended.
    pub fn end_all(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.lock().keys().cloned().collect();
        ids.iter().filter(|id| self.end_session(id)).count()
    }

    pub fn stats(&self, id: &SessionId) -> Option<SessionStats> {
        let now = self.clock.now();
        let sessions = self.sessions.lock();
        let state = sessions.get(id)?;
        let progress = state.progress(now, &self.settings);
        Some(SessionStats {
            elapsed: progress.elapsed,
            since_activity: progress.since_activity,
            output_size: progress.output_size,
            loop_suspicion: progress.loop_suspicion,
            pattern_counts: state
                .alerted
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        })
    }

    pub fn loop_suspicion(&self, id: &SessionId) -> Option<u8> {
        self.sessions
            .lock()
            .get(id)
            .map(|state| state.loop_suspicion(&self.settings))
    }

    pub fn is_active(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// The absolute timeout timer fired.
    pub fn on_timeout_timer(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        let (report, observer) = {
            let sessions = self.sessions.lock();
            let Some(state) = sessions.get(id) else {
                return false;
            };
            let reason = if state.extended {
                TimeoutReason::TimeoutExtended
            } else {
                TimeoutReason::Timeout
            };
            let report = TimeoutReport {
                elapsed: now.saturating_duration_since(state.started_at),
                reason,
            };
            (report, Arc::clone(&state.observer))
        };
        tracing::warn!(
            session_id = %id,
            reason = report.reason.as_str(),
            elapsed = %format_elapsed(report.elapsed.as_secs()),
            "session timed out"
        );
        observer.on_timeout(report);
        true
    }

    /// The progress timer fired; report and re-arm.
    pub fn on_progress_timer(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        let (report, observer) = {
            let sessions = self.sessions.lock();
            let Some(state) = sessions.get(id) else {
                return false;
            };
            self.scheduler.lock().set_timer(
                TimerId::session_progress(id),
                self.settings.progress_interval,
                now,
            );
            (state.progress(now, &self.settings), Arc::clone(&state.observer))
        };
        tracing::debug!(
            session_id = %id,
            output_size = report.output_size,
            loop_suspicion = report.loop_suspicion,
            "session progress"
        );
        observer.on_progress(report);
        true
    }

    /// The stall timer fired.
    ///
    /// Output re-arms the stall timer, so it only comes due after a full
    /// idle period. It is not re-armed here: one notification per idle
    /// period.
    pub fn on_stall_timer(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        let (report, observer) = {
            let sessions = self.sessions.lock();
            let Some(state) = sessions.get(id) else {
                return false;
            };
            let since_activity = now.saturating_duration_since(state.last_activity);
            if since_activity < self.settings.stall {
                let deadline = state.last_activity + self.settings.stall;
                self.scheduler
                    .lock()
                    .set_timer_at(TimerId::session_stall(id), deadline);
                return false;
            }
            let report = StallReport {
                elapsed: now.saturating_duration_since(state.started_at),
                since_activity,
            };
            (report, Arc::clone(&state.observer))
        };
        tracing::warn!(
            session_id = %id,
            idle = %format_elapsed(report.since_activity.as_secs()),
            "session stalled"
        );
        observer.on_stall(report);
        true
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
