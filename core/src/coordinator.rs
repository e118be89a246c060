use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::models::TaskFilter;
use crate::repository::{InstanceRegistry, KnowledgeGraphStore, SessionLog, StratigraphyStore, TaskStore};

/// The daemon's single shared-state value (Design Notes: "Model as an
/// explicit Coordinator/Service value constructed at start-up, holding
/// handles to each store and the HTTP router").
///
/// No global mutable state lives anywhere in this workspace; every
/// handler, background worker, and tool-RPC dispatcher is handed a
/// clone of this `Arc`-backed struct rather than reaching for a
/// process-wide singleton.
#[derive(Clone)]
pub struct Coordinator {
    pub graph: Arc<dyn KnowledgeGraphStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub stratigraphy: Arc<dyn StratigraphyStore>,
    pub instances: Arc<dyn InstanceRegistry>,
    pub session_log: Arc<dyn SessionLog>,
    pub config: Arc<Config>,
}

impl Coordinator {
    pub fn new(
        graph: Arc<dyn KnowledgeGraphStore>,
        tasks: Arc<dyn TaskStore>,
        stratigraphy: Arc<dyn StratigraphyStore>,
        instances: Arc<dyn InstanceRegistry>,
        session_log: Arc<dyn SessionLog>,
        config: Config,
    ) -> Self {
        Self {
            graph,
            tasks,
            stratigraphy,
            instances,
            session_log,
            config: Arc::new(config),
        }
    }

    /// Cross-store effect of an instance going away (spec.md §4.1
    /// "Auto-release", §5 "Cross-store invariants"): release every task
    /// the instance was holding, then note it in the session log. Each
    /// step is independently atomic; there is no super-lock spanning
    /// both stores (Design Notes: "Break the cycle by making
    /// cross-component effects explicit sequences of atomic
    /// operations").
    pub async fn auto_release_instance(&self, instance_id: &str) -> crate::error::Result<Vec<crate::models::Task>> {
        let released = self.tasks.release_all_for(instance_id).await?;
        if !released.is_empty() {
            let ids: Vec<_> = released.iter().map(|t| t.id.clone()).collect();
            let _ = self
                .session_log
                .append(
                    "auto_release".to_string(),
                    format!("instance {instance_id} disconnected, released tasks: {}", ids.join(", ")),
                )
                .await;
        }
        Ok(released)
    }

    /// Lazy-expiry auto-release (spec.md Open Questions, resolved in
    /// SPEC_FULL.md §D.1: both explicit deregister and expiry-detected
    /// disconnect release a claimant's tasks). The instance registry
    /// purges expired rows internally on every call and never records
    /// which ids it dropped, so this compares the live set against
    /// every claimant currently holding a task and releases the ones
    /// the registry no longer recognizes.
    pub async fn reap_orphaned_claims(&self) -> crate::error::Result<Vec<crate::models::Task>> {
        let live: HashSet<String> = self.instances.list(None).await?.into_iter().map(|i| i.id).collect();
        let tasks = self.tasks.list(TaskFilter::default()).await?;
        let orphaned: HashSet<String> = tasks
            .iter()
            .filter(|t| t.holds_scope())
            .filter_map(|t| t.claimed_by.clone())
            .filter(|claimant| !live.contains(claimant))
            .collect();

        let mut released = Vec::new();
        for claimant in orphaned {
            released.extend(self.auto_release_instance(&claimant).await?);
        }
        Ok(released)
    }

    /// Stale-claim reaper for handoffs (spec.md §4.3): releases any
    /// handoff claimed by an id no longer in the live instance set,
    /// once the claim is older than `max_age`.
    pub async fn reap_stale_handoff_claims(&self, max_age: chrono::Duration) -> crate::error::Result<Vec<i64>> {
        let live: Vec<String> = self.instances.list(None).await?.into_iter().map(|i| i.id).collect();
        self.stratigraphy.reap_stale_claims(&live, max_age).await
    }
}
