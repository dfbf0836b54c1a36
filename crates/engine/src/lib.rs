// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vigil supervision engine

pub mod controller;
pub mod cooldown;
mod error;
pub mod heartbeat;
pub mod patterns;
pub mod readiness;
pub mod reconciler;
mod scheduler;
pub mod session;
mod supervisor;
mod tail;

pub use controller::{ControllerDeps, ProcessController, ResourceControl};
pub use cooldown::CooldownLedger;
pub use error::{DeclineReason, RestartOutcome, SupervisorError};
pub use heartbeat::{Heartbeat, SweepReport};
pub use patterns::PatternToken;
pub use reconciler::{Action, Decision, HealthReconciler, ProbeHealth, ReconcileReport, Trigger};
pub use scheduler::Scheduler;
pub use session::{
    LoopReport, ProgressReport, SessionMonitor, SessionObserver, SessionStats, StallReport,
    TimeoutReason, TimeoutReport,
};
pub use supervisor::{ShutdownReport, StartupReport, Supervisor, SupervisorDeps};
