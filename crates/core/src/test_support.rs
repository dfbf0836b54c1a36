// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Event, Generation, ManagedResource, ResourceId, ResourceKind, TimerId};

// ── Resource builders ───────────────────────────────────────────────────────

pub fn dev_server(id: &str, command: &str) -> ManagedResource {
    ManagedResource::new(id, ResourceKind::DevServer, "/test/project").with_command(command)
}

pub fn daemon(id: &str, command: &str) -> ManagedResource {
    ManagedResource::new(id, ResourceKind::Daemon, "/test/project").with_command(command)
}

pub fn unconfigured(id: &str) -> ManagedResource {
    ManagedResource::new(id, ResourceKind::DevServer, "/test/project")
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn output_event(id: &str, generation: u64, chunk: &str) -> Event {
    Event::ProcessOutput {
        resource_id: ResourceId::new(id),
        generation: Generation(generation),
        chunk: chunk.to_string(),
    }
}

pub fn exit_event(id: &str, generation: u64, exit_code: Option<i32>) -> Event {
    Event::ProcessExited {
        resource_id: ResourceId::new(id),
        generation: Generation(generation),
        exit_code,
    }
}

pub fn timer_event(id: TimerId) -> Event {
    Event::TimerStart { id }
}
