// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O

pub mod capability;
pub mod connection;
mod env;
pub mod http;
pub mod port;
pub mod process;
pub mod traced;

pub use capability::{Capability, CapabilityProbe, WhichCapabilityProbe};
pub use connection::{ChannelConnection, Connection, ConnectionCommand, ConnectionError};
pub use http::{parse_probe_url, HttpProbe, ProbeError, ReqwestHttpProbe};
pub use port::{PortProbe, TcpPortProbe};
pub use process::{ProcessAdapter, ProcessError, ProcessHandle, ShellProcessAdapter, SpawnRequest};
pub use traced::{TracedHttpProbe, TracedProcess};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use capability::FakeCapabilityProbe;
#[cfg(any(test, feature = "test-support"))]
pub use connection::FakeConnection;
#[cfg(any(test, feature = "test-support"))]
pub use http::{FakeHttpProbe, FakeResponse};
#[cfg(any(test, feature = "test-support"))]
pub use port::FakePortProbe;
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeProcessAdapter, ProcessCall};
