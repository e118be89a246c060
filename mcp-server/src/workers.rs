//! Thin wiring around `howell-workers`' watchdog-supervised background
//! workers (spec.md §4.7): the daemon just spawns them against its
//! coordinator and keeps the shared health/ring state for `/status`
//! and `/changes`.

use std::sync::Arc;

use howell_core::Coordinator;
use howell_workers::WorkerHandles;
use tokio::task::JoinHandle;

pub fn start(coordinator: Arc<Coordinator>) -> (WorkerHandles, Vec<JoinHandle<()>>) {
    howell_workers::spawn_all(coordinator)
}
