// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local TCP port occupancy checks

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpStream;

/// Answers "is something already listening on this local port?"
#[async_trait]
pub trait PortProbe: Clone + Send + Sync + 'static {
    async fn in_use(&self, port: u16) -> bool;
}

/// Probes by connecting to the loopback interfaces.
///
/// A successful connect on either IPv4 or IPv6 loopback means another
/// process owns the port.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpPortProbe;

impl TcpPortProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn in_use(&self, port: u16) -> bool {
        let timeout = crate::env::port_probe_timeout();
        let candidates = [
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            SocketAddr::from((Ipv6Addr::LOCALHOST, port)),
        ];
        for addr in candidates {
            if let Ok(Ok(_)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                tracing::debug!(port, %addr, "port already bound");
                return true;
            }
        }
        false
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::PortProbe;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakePortState {
        bound: HashSet<u16>,
        checked: Vec<u16>,
    }

    /// Fake port probe with an explicit set of bound ports
    #[derive(Clone, Default)]
    pub struct FakePortProbe {
        inner: Arc<Mutex<FakePortState>>,
    }

    impl FakePortProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn bind(&self, port: u16) {
            self.inner.lock().bound.insert(port);
        }

        pub fn release(&self, port: u16) {
            self.inner.lock().bound.remove(&port);
        }

        /// Ports asked about, in order
        pub fn checked(&self) -> Vec<u16> {
            self.inner.lock().checked.clone()
        }
    }

    #[async_trait]
    impl PortProbe for FakePortProbe {
        async fn in_use(&self, port: u16) -> bool {
            let mut inner = self.inner.lock();
            inner.checked.push(port);
            inner.bound.contains(&port)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePortProbe;

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
