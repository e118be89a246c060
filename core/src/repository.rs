use async_trait::async_trait;

use crate::{
    error::Result,
    models::{
        AgentRecord, CreateFromTemplate, Entity, FileConflict, Handoff, Instance, KnowledgeGraph,
        NewTask, Note, NoteCategory, ProgressNote, Relation, SessionLogEntry, Task, TaskFilter,
        TaskTemplate,
    },
};

/// Store for the shared knowledge graph (spec.md §4.2).
///
/// Implementations own their own serialization; callers never see
/// partial writes. Merge semantics: re-upserting an entity unions its
/// observations (no duplicates), relations are deduplicated by their
/// full triple.
#[async_trait]
pub trait KnowledgeGraphStore: Send + Sync {
    async fn load(&self) -> Result<KnowledgeGraph>;

    /// Insert or merge an entity's observations into the existing one
    /// of the same name.
    async fn upsert_entity(&self, name: &str, entity_type: &str, observations: Vec<String>) -> Result<Entity>;

    /// Append one observation to an existing entity.
    async fn add_observation(&self, name: &str, observation: String) -> Result<Entity>;

    async fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    /// Deletes the entity and cascades to every relation naming it.
    async fn delete_entity(&self, name: &str) -> Result<()>;

    /// Case-insensitive containment match; removes every observation
    /// that contains `substring`.
    async fn delete_observation_by_substring(&self, name: &str, substring: &str) -> Result<usize>;

    /// Add a relation if it is not already present (dedup by full
    /// triple); fails if either endpoint is missing.
    async fn add_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<Relation>;

    async fn delete_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<()>;

    /// Rewrites every incident relation to the new name; refuses if an
    /// entity with `new_name` already exists.
    async fn rename_entity(&self, old_name: &str, new_name: &str) -> Result<Entity>;

    /// Unions observations, redirects incident relations to `target`,
    /// drops self-loops and deduplicates the result, deletes `source`.
    async fn merge_entities(&self, source: &str, target: &str) -> Result<Entity>;

    /// Substring search over entity names, types and observations.
    async fn search(&self, query: &str) -> Result<Vec<Entity>>;

    async fn stats(&self) -> Result<(usize, usize)>;
}

/// Store for the task coordination engine (spec.md §4.1).
///
/// Claim, start, complete, fail and release are expected to be
/// serialized per store instance so the scope-conflict check and the
/// state transition happen atomically with respect to each other.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<Task>;

    async fn create_from_template(&self, req: CreateFromTemplate) -> Result<Task>;

    async fn get(&self, id: &str) -> Result<Task>;

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Pending tasks whose dependencies are all completed and whose
    /// scope does not overlap any currently claimed/in-progress task,
    /// sorted by priority then creation order (§4.1 availability query).
    async fn available(&self) -> Result<Vec<Task>>;

    async fn claim(&self, id: &str, agent: &str) -> Result<Task>;

    async fn start(&self, id: &str, agent: &str) -> Result<Task>;

    async fn add_progress_note(&self, id: &str, agent: &str, text: String) -> Result<ProgressNote>;

    async fn complete(&self, id: &str, agent: &str, result: String, artifacts: Vec<String>) -> Result<Task>;

    /// Worker-facing failure path: re-queues the task to `Pending` with
    /// a progress note recording the failure (Open Questions resolution).
    async fn fail_and_requeue(&self, id: &str, agent: &str, reason: String) -> Result<Task>;

    /// Admin-only path to the terminal `Failed` state.
    async fn fail_terminal(&self, id: &str, reason: String) -> Result<Task>;

    async fn release(&self, id: &str, agent: &str) -> Result<Task>;

    /// Release every task claimed by `agent`, used on instance
    /// deregister/expiry (§4.1, §4.4).
    async fn release_all_for(&self, agent: &str) -> Result<Vec<Task>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn templates(&self) -> Result<Vec<TaskTemplate>>;

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>>;
}

/// Store for the permanent agent stratigraphy: agent records, notes
/// and handoffs (spec.md §4.4), backed by SQLite.
#[async_trait]
pub trait StratigraphyStore: Send + Sync {
    async fn register_agent(&self, platform: String, workspace: String, model: String, parent: Option<String>) -> Result<AgentRecord>;

    async fn end_agent(&self, id: &str, summary: Option<String>) -> Result<AgentRecord>;

    async fn get_agent(&self, id: &str) -> Result<AgentRecord>;

    async fn list_agents(&self, workspace: Option<&str>) -> Result<Vec<AgentRecord>>;

    async fn add_note(&self, agent_id: &str, category: NoteCategory, content: String, tags: Vec<String>) -> Result<Note>;

    async fn list_notes(&self, agent_id: Option<&str>, category: Option<NoteCategory>) -> Result<Vec<Note>>;

    async fn create_handoff(&self, from_agent: String, to_scope: String, content: String, priority: crate::models::HandoffPriority) -> Result<Handoff>;

    /// Single-record atomic conditional update (spec.md §4.3): succeeds
    /// only if the handoff is still unclaimed, regardless of whether
    /// `claimant` actually falls within `to_scope` — callers are
    /// expected to have selected `id` from [`list_handoffs`] against
    /// their own scope first. This store has no notion of "the
    /// caller's workspace" to check against; scope routing lives in
    /// `list_handoffs`, not here.
    async fn claim_handoff(&self, id: i64, claimant: &str) -> Result<Handoff>;

    async fn list_handoffs(&self, scope: &str, unclaimed_only: bool) -> Result<Vec<Handoff>>;

    /// Composite bootstrap context for a new agent joining a workspace
    /// (§4.3): the claim-all result for every handoff addressed to
    /// `workspace`, the last five agent records for the workspace, and
    /// aggregate stats. `claimant` is the id that takes ownership of
    /// every handoff claimed in the process.
    async fn bootstrap_context(&self, workspace: &str, claimant: &str) -> Result<BootstrapContext>;

    /// Same composition as [`bootstrap_context`](Self::bootstrap_context)
    /// but read-only: lists unclaimed handoffs instead of claiming them
    /// (§4.3 "a read-only preview variant").
    async fn preview_bootstrap_context(&self, workspace: &str) -> Result<BootstrapContext>;

    /// Releases handoffs whose claimant is not in `active_ids` and
    /// whose claim is older than `max_age` (spec.md §4.3 "stale-claim
    /// reaper"). Returns the ids of every handoff released.
    async fn reap_stale_claims(&self, active_ids: &[String], max_age: chrono::Duration) -> Result<Vec<i64>>;

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>>;
}

/// One of the last five agents for a workspace, enriched with its
/// recent {learned, decision, warning, blocker} notes (§4.3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentWithNotes {
    pub agent: AgentRecord,
    pub notes: Vec<Note>,
}

/// Composite context returned to a newly-joining agent (§4.3).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BootstrapContext {
    /// The claim-all result in the claiming variant; the unclaimed set
    /// in the read-only preview variant.
    pub handoffs: Vec<Handoff>,
    pub recent_agents: Vec<AgentWithNotes>,
    pub stats: std::collections::HashMap<String, u64>,
}

/// Volatile registry of live instances (spec.md §4.4). Expiry is lazy:
/// every method purges entries whose last heartbeat is older than the
/// registry's timeout before doing its own work.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    async fn register(&self, workspace: String, platform: String, activity: String) -> Result<Instance>;

    async fn heartbeat(&self, id: &str, activity: Option<String>, active_files: Option<Vec<String>>) -> Result<Instance>;

    /// Lightweight partial update of `status` alone (spec.md §3, §4.4
    /// "status-update is a lightweight partial update that does not
    /// reset the expiry clock"). Unlike [`heartbeat`](Self::heartbeat),
    /// this does not touch `last_heartbeat` or `heartbeat_count`.
    async fn update_status(&self, id: &str, status: String) -> Result<Instance>;

    async fn deregister(&self, id: &str) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Instance>;

    async fn list(&self, workspace: Option<&str>) -> Result<Vec<Instance>>;

    /// Other live instances whose `active_files` intersect `files`.
    async fn check_conflicts(&self, id: &str, files: &[String]) -> Result<Vec<FileConflict>>;
}

/// Append-only, capped session log (spec.md §3's "bounded tail",
/// SPEC_FULL.md §C resolves the cap to 100 on-disk entries).
#[async_trait]
pub trait SessionLog: Send + Sync {
    async fn append(&self, action: String, details: String) -> Result<()>;

    async fn recent(&self, limit: usize) -> Result<Vec<SessionLogEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_context_default_is_empty() {
        let ctx = BootstrapContext::default();
        assert!(ctx.recent_agents.is_empty());
        assert!(ctx.handoffs.is_empty());
        assert!(ctx.stats.is_empty());
    }
}
