// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types delivered to the supervisor loop

use crate::id::ResourceId;
use crate::resource::Generation;
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};

/// Notifications that drive supervisor state transitions.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- process --
    /// A chunk of merged stdout/stderr text from a spawned process
    #[serde(rename = "process:output")]
    ProcessOutput {
        resource_id: ResourceId,
        generation: Generation,
        chunk: String,
    },

    /// A spawned process exited; `None` means it was killed by a signal
    #[serde(rename = "process:exited")]
    ProcessExited {
        resource_id: ResourceId,
        generation: Generation,
        exit_code: Option<i32>,
    },

    // -- timer --
    #[serde(rename = "timer:start")]
    TimerStart { id: TimerId },

    // -- system --
    #[serde(rename = "system:shutdown")]
    Shutdown,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ProcessOutput { .. } => "process:output",
            Event::ProcessExited { .. } => "process:exited",
            Event::TimerStart { .. } => "timer:start",
            Event::Shutdown => "system:shutdown",
        }
    }

    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            Event::ProcessOutput { resource_id, .. } | Event::ProcessExited { resource_id, .. } => {
                Some(resource_id)
            }
            Event::TimerStart { .. } | Event::Shutdown => None,
        }
    }

    /// One-line summary for logs; output chunks report their length only.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ProcessOutput {
                resource_id,
                generation,
                chunk,
            } => format!(
                "{} resource={} gen={} bytes={}",
                self.name(),
                resource_id,
                generation,
                chunk.len()
            ),
            Event::ProcessExited {
                resource_id,
                generation,
                exit_code,
            } => {
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                format!(
                    "{} resource={} gen={} code={}",
                    self.name(),
                    resource_id,
                    generation,
                    code
                )
            }
            Event::TimerStart { id } => format!("{} id={}", self.name(), id),
            Event::Shutdown => self.name().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
