// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Default resolution of the timer check loop
pub const DEFAULT_TIMER_CHECK: Duration = Duration::from_millis(250);

/// Resolve state directory: VIGIL_STATE_DIR > XDG_STATE_HOME/vigil > ~/.local/state/vigil
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("VIGIL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("vigil"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/vigil"))
}

/// Explicit config file path, if set
pub fn config_path() -> Option<PathBuf> {
    std::env::var("VIGIL_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Timer check interval, overridable with VIGIL_TIMER_CHECK_MS
pub fn timer_check_interval() -> Duration {
    std::env::var("VIGIL_TIMER_CHECK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_TIMER_CHECK)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
