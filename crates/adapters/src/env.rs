// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Shell used to run resource commands (default: `sh`).
pub fn shell() -> String {
    std::env::var("VIGIL_SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "sh".to_string())
}

/// Connect timeout for local port occupancy checks (default: 500ms).
pub fn port_probe_timeout() -> Duration {
    parse_duration_ms("VIGIL_PORT_PROBE_MS").unwrap_or(Duration::from_millis(500))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
