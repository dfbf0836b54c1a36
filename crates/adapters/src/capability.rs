// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executable availability lookup

use std::path::PathBuf;

/// Result of looking up an executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl Capability {
    pub fn found(path: impl Into<PathBuf>) -> Self {
        Self {
            available: true,
            path: Some(path.into()),
        }
    }

    pub fn missing() -> Self {
        Self {
            available: false,
            path: None,
        }
    }
}

/// Looks up whether a program can be launched on this host.
pub trait CapabilityProbe: Clone + Send + Sync + 'static {
    fn lookup(&self, program: &str) -> Capability;
}

/// Searches `PATH` with the `which` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct WhichCapabilityProbe;

impl WhichCapabilityProbe {
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProbe for WhichCapabilityProbe {
    fn lookup(&self, program: &str) -> Capability {
        match which::which(program) {
            Ok(path) => Capability::found(path),
            Err(e) => {
                tracing::debug!(program, error = %e, "executable not found");
                Capability::missing()
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::{Capability, CapabilityProbe};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Fake lookup table. Programs not installed are missing.
    #[derive(Clone, Default)]
    pub struct FakeCapabilityProbe {
        installed: Arc<Mutex<HashMap<String, Capability>>>,
    }

    impl FakeCapabilityProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn install(&self, program: &str) {
            self.installed.lock().insert(
                program.to_string(),
                Capability::found(format!("/usr/local/bin/{}", program)),
            );
        }
    }

    impl CapabilityProbe for FakeCapabilityProbe {
        fn lookup(&self, program: &str) -> Capability {
            self.installed
                .lock()
                .get(program)
                .cloned()
                .unwrap_or_else(Capability::missing)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCapabilityProbe;

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
