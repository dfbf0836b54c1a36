// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vigil-core: shared types for the vigil process supervisor

pub mod clock;
pub mod config;
pub mod event;
pub mod id;
pub mod resource;
pub mod time_fmt;
pub mod timer;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    ConfigError, ConfigFile, ControllerSettings, HealthSettings, HeartbeatSettings,
    SessionSettings, SupervisorConfig,
};
pub use event::Event;
pub use id::{ConnectionId, ResourceId, SessionId};
pub use resource::{Generation, ManagedResource, ResourceKind, ResourceStatus, StatusSnapshot};
pub use time_fmt::{format_duration, format_elapsed, parse_duration};
pub use timer::{TimerId, TimerKind};
