use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------
// Task coordination
// ---------------------------------------------------------------------

/// A task's declared footprint over files, directories, and free-form
/// tags. Two scopes overlap (see [`crate::validation::scopes_overlap`])
/// iff they share a file, one's directory prefixes the other's, or they
/// share a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskScope {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskScope {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Sorts last in availability order.
    Low,
    Medium,
    High,
    /// Sorts first in availability order.
    Critical,
}

impl TaskPriority {
    /// Lower rank claims first: Critical=0 .. Low=3.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    InProgress,
    Completed,
    /// Reachable only via an admin operation (spec.md Open Questions);
    /// the worker-facing failure path recycles to `Pending` instead.
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A single freeform progress update recorded against a claimed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressNote {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Unit of work tracked through its lifecycle by the task coordination
/// engine. See spec.md §3 ("Task") and §4.1 for the full state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// `YYMMDD-<6hex>`
    pub id: String,
    pub title: String,
    pub description: String,
    pub project: String,
    pub scope: TaskScope,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub dependencies: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub progress_notes: Vec<ProgressNote>,
}

impl Task {
    /// Whether this task is sitting in a claimable slot that blocks
    /// conflicting scopes (§4.1 availability query).
    pub fn holds_scope(&self) -> bool {
        matches!(self.status, TaskStatus::Claimed | TaskStatus::InProgress)
    }
}

/// Fields supplied by a caller creating a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub scope: TaskScope,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_by: String,
}

/// Filter criteria for listing tasks. All fields optional and ANDed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
    pub claimed_by: Option<String>,
}

/// A catalog entry mapping a template name to scaffold defaults (§4.1
/// "Templates").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub title_prefix: String,
    pub default_priority: TaskPriority,
    pub default_tags: Vec<String>,
    pub description_scaffold: String,
}

/// Caller-supplied extras when instantiating a template (§4.1
/// `create_from_template`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFromTemplate {
    pub template_name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub extra_tags: Vec<String>,
    #[serde(default)]
    pub extra_scope: TaskScope,
    pub created_by: String,
}

// ---------------------------------------------------------------------
// Knowledge graph
// ---------------------------------------------------------------------

/// A knowledge-graph node: a unique name, a free-form type tag, and an
/// append-only (duplicate-free on merge) list of observation strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relation {
    pub from_entity: String,
    pub relation_type: String,
    pub to_entity: String,
    pub created_at: DateTime<Utc>,
}

/// The whole knowledge graph document: entities keyed by name, an
/// ordered multiset of relations, and a last-sync marker.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeGraph {
    pub entities: HashMap<String, Entity>,
    pub relations: Vec<Relation>,
    pub last_sync: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------
// Agent stratigraphy
// ---------------------------------------------------------------------

/// A permanent record of one agent session, keyed by an id of the form
/// `CH-YYMMDD-N`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRecord {
    pub id: String,
    pub parent: Option<String>,
    pub platform: String,
    pub workspace: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    Learned,
    Decision,
    Blocker,
    Warning,
    Context,
    Observation,
}

impl NoteCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteCategory::Learned => "learned",
            NoteCategory::Decision => "decision",
            NoteCategory::Blocker => "blocker",
            NoteCategory::Warning => "warning",
            NoteCategory::Context => "context",
            NoteCategory::Observation => "observation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "learned" => Some(Self::Learned),
            "decision" => Some(Self::Decision),
            "blocker" => Some(Self::Blocker),
            "warning" => Some(Self::Warning),
            "context" => Some(Self::Context),
            "observation" => Some(Self::Observation),
            _ => None,
        }
    }
}

/// An immutable note an agent leaves against its own record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub agent_id: String,
    pub category: NoteCategory,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for HandoffPriority {
    fn default() -> Self {
        HandoffPriority::Normal
    }
}

impl HandoffPriority {
    /// Unknown values on the wire coerce to `Normal` (spec.md §3).
    pub fn coerce(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Normal,
        }
    }
}

/// A note left by one agent for the next agent to claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handoff {
    pub id: i64,
    pub from_agent: String,
    /// A workspace name, `*` for all, or a specific agent id.
    pub to_scope: String,
    pub content: String,
    pub priority: HandoffPriority,
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------
// Instance registry (volatile)
// ---------------------------------------------------------------------

/// A live agent session holding an opaque id returned by register.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: String,
    pub workspace: String,
    pub platform: String,
    pub status: String,
    pub activity: String,
    #[serde(default)]
    pub active_files: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub heartbeat_count: u64,
}

/// A file-conflict observation returned by the registry's conflict check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConflict {
    pub file: String,
    pub other_id: String,
    pub workspace: String,
    pub platform: String,
    pub activity: String,
}

// ---------------------------------------------------------------------
// Session log
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rank_orders_critical_first() {
        let mut ps = vec![
            TaskPriority::Low,
            TaskPriority::Critical,
            TaskPriority::Medium,
            TaskPriority::High,
        ];
        ps.sort_by_key(|p| p.rank());
        assert_eq!(
            ps,
            vec![
                TaskPriority::Critical,
                TaskPriority::High,
                TaskPriority::Medium,
                TaskPriority::Low
            ]
        );
    }

    #[test]
    fn handoff_priority_coerces_unknown_to_normal() {
        assert_eq!(HandoffPriority::coerce("urgent"), HandoffPriority::Normal);
        assert_eq!(HandoffPriority::coerce("high"), HandoffPriority::High);
    }

    #[test]
    fn note_category_round_trips() {
        for cat in [
            NoteCategory::Learned,
            NoteCategory::Decision,
            NoteCategory::Blocker,
            NoteCategory::Warning,
            NoteCategory::Context,
            NoteCategory::Observation,
        ] {
            assert_eq!(NoteCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(NoteCategory::parse("invalid"), None);
    }

    #[test]
    fn task_scope_empty() {
        assert!(TaskScope::default().is_empty());
        let s = TaskScope {
            tags: vec!["ui".into()],
            ..Default::default()
        };
        assert!(!s.is_empty());
    }
}
