//! Watchdog supervisor (spec.md §4.7): wraps each worker in a loop that
//! catches every error, logs it, increments a restart counter, records
//! the last-error string, waits a delay, and re-invokes the worker.
//! Health is exposed via the daemon's `/status` endpoint through
//! [`WorkerHandles`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::watcher::FsChangeEvent;

const WATCHER_RING_CAPACITY: usize = 100;
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Per-worker restart bookkeeping, surfaced at `/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerHealth {
    pub restart_count: u64,
    pub last_error: Option<String>,
    pub last_restart_at: Option<DateTime<Utc>>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Shared state the watchdog-wrapped workers publish into, and that the
/// HTTP surface reads back out (`/status`, `/changes`).
#[derive(Clone)]
pub struct WorkerHandles {
    pub watcher_events: Arc<Mutex<VecDeque<FsChangeEvent>>>,
    pub health: Arc<Mutex<HashMap<String, WorkerHealth>>>,
}

impl WorkerHandles {
    pub fn new() -> Self {
        Self {
            watcher_events: Arc::new(Mutex::new(VecDeque::with_capacity(WATCHER_RING_CAPACITY))),
            health: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn push_event(&self, event: FsChangeEvent) {
        let mut ring = self.watcher_events.lock().await;
        if ring.len() >= WATCHER_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    pub async fn recent_events(&self) -> Vec<FsChangeEvent> {
        self.watcher_events.lock().await.iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> HashMap<String, WorkerHealth> {
        self.health.lock().await.clone()
    }

    async fn record_tick(&self, name: &str) {
        let mut health = self.health.lock().await;
        health.entry(name.to_string()).or_default().last_tick_at = Some(Utc::now());
    }

    async fn record_failure(&self, name: &str, error: String) {
        let mut health = self.health.lock().await;
        let entry = health.entry(name.to_string()).or_default();
        entry.restart_count += 1;
        entry.last_error = Some(error);
        entry.last_restart_at = Some(Utc::now());
    }
}

impl Default for WorkerHandles {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `tick` every `interval`, forever, restarting after `RESTART_DELAY`
/// whenever a tick returns an error. Never panics the caller's task: a
/// panicking tick is not caught here (per spec.md §9 this loop models
/// the source's catch-log-restart contract for ordinary errors; a panic
/// is an `Internal` bug the process-level supervisor, not this loop,
/// should surface).
pub async fn run_watchdog<F, Fut>(name: &str, interval: Duration, handles: WorkerHandles, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    loop {
        match tick().await {
            Ok(()) => {
                handles.record_tick(name).await;
            }
            Err(e) => {
                tracing::error!(worker = name, error = %e, "worker tick failed, will restart after delay");
                handles.record_failure(name, e.to_string()).await;
                tokio::time::sleep(RESTART_DELAY).await;
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::FsChangeKind;

    #[tokio::test]
    async fn ring_buffer_caps_at_capacity() {
        let handles = WorkerHandles::new();
        for i in 0..(WATCHER_RING_CAPACITY + 10) {
            handles
                .push_event(FsChangeEvent {
                    path: format!("/tmp/{i}"),
                    kind: FsChangeKind::Modified,
                    detected_at: Utc::now(),
                })
                .await;
        }
        assert_eq!(handles.recent_events().await.len(), WATCHER_RING_CAPACITY);
    }

    #[tokio::test]
    async fn watchdog_records_tick_health() {
        let handles = WorkerHandles::new();
        let h = handles.clone();
        let handle = tokio::spawn(async move {
            run_watchdog("test-worker", Duration::from_millis(5), h, || async { Ok(()) }).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        let snapshot = handles.snapshot().await;
        assert!(snapshot.get("test-worker").unwrap().last_tick_at.is_some());
    }

    #[tokio::test]
    async fn watchdog_records_restart_on_error() {
        let handles = WorkerHandles::new();
        let h = handles.clone();
        let handle = tokio::spawn(async move {
            run_watchdog("flaky", Duration::from_millis(5), h, || async { Err(anyhow::anyhow!("boom")) }).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        let snapshot = handles.snapshot().await;
        let health = snapshot.get("flaky").unwrap();
        assert!(health.restart_count >= 1);
        assert_eq!(health.last_error.as_deref(), Some("boom"));
    }
}
