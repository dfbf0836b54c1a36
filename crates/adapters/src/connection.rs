// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional connection primitives used by the heartbeat

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use vigil_core::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    #[error("send to {0} failed: {1}")]
    SendFailed(ConnectionId, String),
}

/// A live connection that can be pinged and forcibly closed.
///
/// Pong receipt is reported by the transport to the heartbeat, not
/// through this trait.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn id(&self) -> &ConnectionId;

    fn is_open(&self) -> bool;

    async fn ping(&self) -> Result<(), ConnectionError>;

    /// Close without a handshake. Never fails; a dead peer is already closed.
    async fn terminate(&self);
}

/// Commands delivered to the task that owns the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    Ping,
    Terminate,
}

/// Connection that forwards commands over a channel to its transport task.
#[derive(Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<ConnectionCommand>,
}

impl ChannelConnection {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<ConnectionCommand>) -> Self {
        Self { id, tx }
    }

    /// Create a connection and the receiver its transport task should drain.
    pub fn pair(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<ConnectionCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(id, tx), rx)
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        self.tx
            .try_send(ConnectionCommand::Ping)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed(self.id.clone()),
                mpsc::error::TrySendError::Full(_) => {
                    ConnectionError::SendFailed(self.id.clone(), "outbox full".to_string())
                }
            })
    }

    async fn terminate(&self) {
        if self.tx.try_send(ConnectionCommand::Terminate).is_err() {
            tracing::debug!(connection_id = %self.id, "terminate on closed connection");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::{Connection, ConnectionError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use vigil_core::ConnectionId;

    #[derive(Default)]
    struct FakeConnectionState {
        pings: u32,
        terminated: bool,
        closed: bool,
        fail_pings: bool,
    }

    /// Fake connection recording pings and terminations
    #[derive(Clone)]
    pub struct FakeConnection {
        id: ConnectionId,
        inner: Arc<Mutex<FakeConnectionState>>,
    }

    impl FakeConnection {
        pub fn new(id: &str) -> Self {
            Self {
                id: ConnectionId::new(id),
                inner: Arc::new(Mutex::new(FakeConnectionState::default())),
            }
        }

        pub fn pings(&self) -> u32 {
            self.inner.lock().pings
        }

        pub fn terminated(&self) -> bool {
            self.inner.lock().terminated
        }

        /// Simulate the peer going away
        pub fn close(&self) {
            self.inner.lock().closed = true;
        }

        pub fn fail_pings(&self) {
            self.inner.lock().fail_pings = true;
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn id(&self) -> &ConnectionId {
            &self.id
        }

        fn is_open(&self) -> bool {
            let inner = self.inner.lock();
            !inner.closed && !inner.terminated
        }

        async fn ping(&self) -> Result<(), ConnectionError> {
            let mut inner = self.inner.lock();
            if inner.fail_pings {
                return Err(ConnectionError::SendFailed(
                    self.id.clone(),
                    "broken pipe".to_string(),
                ));
            }
            inner.pings += 1;
            Ok(())
        }

        async fn terminate(&self) {
            self.inner.lock().terminated = true;
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeConnection;

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
