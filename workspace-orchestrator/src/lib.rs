//! The four background workers and their watchdog (spec.md §4.7):
//! heartbeat integrity, filesystem watcher, generation-queue executor,
//! and post scheduler. Each is a free function wrapped by
//! [`supervisor::run_watchdog`] and spawned onto its own tokio task;
//! `mcp-server` owns the task handles and the process lifetime.

pub mod generation_queue;
pub mod heartbeat;
pub mod scheduler;
pub mod supervisor;
pub mod templates;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

use howell_core::Coordinator;
use tokio::task::JoinHandle;

pub use supervisor::{WorkerHandles, WorkerHealth};

/// Maximum handoff-claim age before the stale-claim reaper releases it
/// (spec.md §4.3), matching the instance registry's own default expiry.
const STALE_HANDOFF_CLAIM_MAX_AGE_SECS: i64 = 600;

/// Spawns all four workers against `coordinator`, returning the shared
/// [`WorkerHandles`] (for `/status` and `/changes`) and the join
/// handles (for shutdown).
pub fn spawn_all(coordinator: Arc<Coordinator>) -> (WorkerHandles, Vec<JoinHandle<()>>) {
    let handles = WorkerHandles::new();
    let mut joins = Vec::new();

    {
        let coordinator = coordinator.clone();
        let handles = handles.clone();
        let interval = Duration::from_secs(coordinator.config.heartbeat_interval_hours * 3600);
        joins.push(tokio::spawn(async move {
            supervisor::run_watchdog("heartbeat_integrity", interval, handles, || {
                let coordinator = coordinator.clone();
                async move { heartbeat::run_once(&coordinator).await.map(|_| ()) }
            })
            .await;
        }));
    }

    {
        let coordinator = coordinator.clone();
        let handles = handles.clone();
        let interval = Duration::from_secs(coordinator.config.watcher_interval_seconds);
        joins.push(tokio::spawn(async move {
            let previous = Arc::new(tokio::sync::Mutex::new(watcher::Snapshot::new()));
            let log_path = std::path::PathBuf::from(&coordinator.config.persist_root).join("watcher.log");
            supervisor::run_watchdog("filesystem_watcher", interval, handles.clone(), || {
                let handles = handles.clone();
                let log_path = log_path.clone();
                let watch_dirs = coordinator.config.watch_dirs.clone();
                let previous = previous.clone();
                let coordinator = coordinator.clone();
                async move {
                    let current = watcher::scan(&watch_dirs);
                    let mut previous = previous.lock().await;
                    let events = watcher::diff(&previous, &current);
                    for event in &events {
                        handles.push_event(event.clone()).await;
                    }
                    watcher::append_log(&log_path, &events).await;
                    *previous = current;

                    // Lazy-expiry auto-release (spec.md Open Questions):
                    // the instance registry purges expired rows silently,
                    // so each tick reconciles claimed tasks against who's
                    // still live and releases the rest.
                    match coordinator.reap_orphaned_claims().await {
                        Ok(released) if !released.is_empty() => {
                            tracing::info!(count = released.len(), "filesystem watcher tick reaped orphaned claims");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(%err, "failed to reap orphaned claims"),
                    }

                    // Stale-claim reaper for handoffs (spec.md §4.3):
                    // same live-instance reconciliation, for the
                    // agent-stratigraphy store's own claim records.
                    let max_age = chrono::Duration::seconds(STALE_HANDOFF_CLAIM_MAX_AGE_SECS);
                    match coordinator.reap_stale_handoff_claims(max_age).await {
                        Ok(released) if !released.is_empty() => {
                            tracing::info!(count = released.len(), "filesystem watcher tick reaped stale handoff claims");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(%err, "failed to reap stale handoff claims"),
                    }

                    Ok(())
                }
            })
            .await;
        }));
    }

    {
        let coordinator = coordinator.clone();
        let handles = handles.clone();
        let interval = Duration::from_secs(coordinator.config.queue_interval_seconds);
        let client = reqwest::Client::new();
        joins.push(tokio::spawn(async move {
            supervisor::run_watchdog("generation_queue", interval, handles, || {
                let coordinator = coordinator.clone();
                let client = client.clone();
                async move {
                    generation_queue::run_once(
                        &coordinator.config.persist_root,
                        coordinator.config.comfyui_url.as_deref(),
                        &client,
                    )
                    .await
                }
            })
            .await;
        }));
    }

    {
        let coordinator = coordinator.clone();
        let handles = handles.clone();
        let interval = Duration::from_secs(coordinator.config.moltbook_interval_seconds);
        let client = reqwest::Client::new();
        joins.push(tokio::spawn(async move {
            supervisor::run_watchdog("post_scheduler", interval, handles, || {
                let coordinator = coordinator.clone();
                let client = client.clone();
                async move { scheduler::run_once(&coordinator.config.persist_root, None, &client).await }
            })
            .await;
        }));
    }

    (handles, joins)
}
