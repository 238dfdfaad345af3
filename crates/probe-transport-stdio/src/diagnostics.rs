//! Background collection of the server's stderr.
//!
//! The server may log heavily on stderr. An undrained pipe fills up and
//! blocks the server, so a task reads it continuously and keeps the most
//! recent lines. The probe only ever looks at them as best-effort
//! diagnostics.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Lines kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Default)]
struct Shared {
    lines: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl Shared {
    fn lines(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps the last `capacity` non-blank stderr lines.
pub struct StderrCollector {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl StderrCollector {
    /// Starts draining `reader` on a background task.
    pub fn spawn<R>(reader: R, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let capacity = capacity.max(1);
        let task = tokio::spawn(drain(reader, capacity, shared.clone()));
        Self { shared, task }
    }

    /// Most recent line, waiting up to `wait` if nothing has arrived yet.
    pub async fn last_line(&self, wait: Duration) -> Option<String> {
        let notified = self.shared.notify.notified();
        if let Some(line) = self.shared.lines().back().cloned() {
            return Some(line);
        }
        let _ = tokio::time::timeout(wait, notified).await;
        self.shared.lines().back().cloned()
    }

    /// All retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.shared.lines().iter().cloned().collect()
    }
}

impl Drop for StderrCollector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drain<R>(reader: R, capacity: usize, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                // Stderr is free text; bytes that are not UTF-8 are replaced, not fatal.
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                trace!(len = line.len(), "server stderr line");
                {
                    let mut buf = shared.lines();
                    if buf.len() == capacity {
                        buf.pop_front();
                    }
                    buf.push_back(line);
                }
                shared.notify.notify_waiters();
            }
            Err(e) => {
                debug!(error = %e, "stopped reading server stderr");
                break;
            }
        }
    }
    // Wake anyone still waiting so they see the final state.
    shared.notify.notify_waiters();
}
