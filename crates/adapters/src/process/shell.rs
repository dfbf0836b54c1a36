// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-backed process adapter

use super::{ProcessAdapter, ProcessError, ProcessHandle, SpawnRequest};
use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use vigil_core::{Event, Generation, ResourceId};

const READ_BUF_SIZE: usize = 4096;

/// Runs commands through the shell, each in its own process group.
///
/// Stdout and stderr are both forwarded as output events, so readiness
/// detection sees everything a terminal would show.
#[derive(Clone, Default)]
pub struct ShellProcessAdapter {
    /// handle id -> process group id of live children
    live: Arc<Mutex<HashMap<String, u32>>>,
}

impl ShellProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children that have not exited yet.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

#[async_trait]
impl ProcessAdapter for ShellProcessAdapter {
    async fn spawn(
        &self,
        request: SpawnRequest,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<ProcessHandle, ProcessError> {
        let mut cmd = Command::new(crate::env::shell());
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.cwd)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ProcessError::SpawnFailed(format!(
                "{} (cwd {}): {}",
                request.command,
                request.cwd.display(),
                e
            ))
        })?;

        let pid = child.id();
        let id = format!("proc-{}", uuid::Uuid::new_v4());
        if let Some(pid) = pid {
            self.live.lock().insert(id.clone(), pid);
        }

        let readers: Vec<_> = [
            child.stdout.take().map(|s| Box::new(s) as Box<dyn AsyncRead + Send + Unpin>),
            child.stderr.take().map(|s| Box::new(s) as Box<dyn AsyncRead + Send + Unpin>),
        ]
        .into_iter()
        .flatten()
        .map(|stream| {
            tokio::spawn(forward_output(
                stream,
                request.resource_id.clone(),
                request.generation,
                event_tx.clone(),
            ))
        })
        .collect();

        let live = Arc::clone(&self.live);
        let handle_id = id.clone();
        let resource_id = request.resource_id;
        let generation = request.generation;
        tokio::spawn(async move {
            let status = child.wait().await;
            // Drain remaining output before reporting the exit
            for reader in readers {
                let _ = reader.await;
            }
            live.lock().remove(&handle_id);

            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(%resource_id, error = %e, "failed to wait on child");
                    None
                }
            };
            let _ = event_tx
                .send(Event::ProcessExited {
                    resource_id,
                    generation,
                    exit_code,
                })
                .await;
        });

        Ok(ProcessHandle { id, pid })
    }

    async fn kill(&self, handle: &ProcessHandle) -> Result<(), ProcessError> {
        let Some(pgid) = self.live.lock().get(&handle.id).copied() else {
            return Err(ProcessError::NotFound(handle.id.clone()));
        };
        killpg(Pid::from_raw(pgid as i32), Signal::SIGTERM)
            .map_err(|e| ProcessError::KillFailed(format!("{}: {}", handle.id, e)))
    }
}

async fn forward_output<R>(
    mut stream: R,
    resource_id: ResourceId,
    generation: Generation,
    event_tx: mpsc::Sender<Event>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut decoder = Utf8Chunker::default();
    loop {
        let chunk = match stream.read(&mut buf).await {
            Ok(0) => decoder.finish(),
            Ok(n) => decoder.push(&buf[..n]),
            Err(e) => {
                tracing::debug!(%resource_id, error = %e, "output stream closed");
                decoder.finish()
            }
        };
        let done = decoder.is_finished();
        if !chunk.is_empty() {
            let event = Event::ProcessOutput {
                resource_id: resource_id.clone(),
                generation,
                chunk,
            };
            if event_tx.send(event).await.is_err() {
                break;
            }
        }
        if done {
            break;
        }
    }
}

/// Turns raw reads into text without splitting a multibyte character.
///
/// An incomplete sequence at the end of a read is held back until the next
/// one. Invalid bytes still become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
    finished: bool,
}

impl Utf8Chunker {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let split = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }

    /// Flush whatever is left; a dangling partial character becomes U+FFFD.
    fn finish(&mut self) -> String {
        self.finished = true;
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Length of a trailing UTF-8 sequence that is cut short, or 0.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
