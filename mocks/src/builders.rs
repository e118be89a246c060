//! Fluent builders for the model types, grounded on the teacher's
//! `TaskBuilder` pattern: a default-populated struct with `with_*`
//! setters, finished off by `build()`.

use chrono::Utc;

use howell_core::models::{
    AgentRecord, Entity, Handoff, HandoffPriority, Instance, NewTask, Note, NoteCategory, Task,
    TaskPriority, TaskScope, TaskStatus,
};

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task {
                id: "000000-000000".to_string(),
                title: "Test Task".to_string(),
                description: "A test task".to_string(),
                project: "test-project".to_string(),
                scope: TaskScope::default(),
                priority: TaskPriority::Medium,
                status: TaskStatus::Pending,
                dependencies: Vec::new(),
                created_by: "test-agent".to_string(),
                created_at: Utc::now(),
                claimed_by: None,
                claimed_at: None,
                started_at: None,
                completed_at: None,
                result: None,
                artifacts: Vec::new(),
                progress_notes: Vec::new(),
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.task.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_scope(mut self, scope: TaskScope) -> Self {
        self.task.scope = scope;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.task.dependencies = dependencies;
        self
    }

    pub fn with_claimed_by(mut self, agent: impl Into<String>) -> Self {
        let agent = agent.into();
        self.task.status = TaskStatus::Claimed;
        self.task.claimed_by = Some(agent);
        self.task.claimed_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NewTaskBuilder {
    new_task: NewTask,
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self {
            new_task: NewTask {
                title: "Test Task".to_string(),
                description: "A test task".to_string(),
                project: "test-project".to_string(),
                scope: TaskScope::default(),
                priority: TaskPriority::Medium,
                dependencies: Vec::new(),
                created_by: "test-agent".to_string(),
            },
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_task.title = title.into();
        self
    }

    pub fn with_scope(mut self, scope: TaskScope) -> Self {
        self.new_task.scope = scope;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.new_task.dependencies = dependencies;
        self
    }

    pub fn with_created_by(mut self, agent: impl Into<String>) -> Self {
        self.new_task.created_by = agent.into();
        self
    }

    pub fn build(self) -> NewTask {
        self.new_task
    }
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EntityBuilder {
    entity: Entity,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity {
                name: name.into(),
                entity_type: "concept".to_string(),
                observations: Vec::new(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity.entity_type = entity_type.into();
        self
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.entity.observations.push(observation.into());
        self
    }

    pub fn build(self) -> Entity {
        self.entity
    }
}

pub struct AgentRecordBuilder {
    agent: AgentRecord,
}

impl AgentRecordBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            agent: AgentRecord {
                id: id.into(),
                parent: None,
                platform: "claude-code".to_string(),
                workspace: "test-workspace".to_string(),
                model: "test-model".to_string(),
                created_at: Utc::now(),
                ended_at: None,
                end_summary: None,
            },
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.agent.parent = Some(parent.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.agent.workspace = workspace.into();
        self
    }

    pub fn ended(mut self, summary: impl Into<String>) -> Self {
        self.agent.ended_at = Some(Utc::now());
        self.agent.end_summary = Some(summary.into());
        self
    }

    pub fn build(self) -> AgentRecord {
        self.agent
    }
}

pub struct NoteBuilder {
    note: Note,
}

impl NoteBuilder {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            note: Note {
                id: 0,
                agent_id: agent_id.into(),
                category: NoteCategory::Context,
                content: "test note".to_string(),
                tags: Vec::new(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_category(mut self, category: NoteCategory) -> Self {
        self.note.category = category;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.note.content = content.into();
        self
    }

    pub fn build(self) -> Note {
        self.note
    }
}

pub struct HandoffBuilder {
    handoff: Handoff,
}

impl HandoffBuilder {
    pub fn new(from_agent: impl Into<String>) -> Self {
        Self {
            handoff: Handoff {
                id: 0,
                from_agent: from_agent.into(),
                to_scope: "*".to_string(),
                content: "handoff content".to_string(),
                priority: HandoffPriority::Normal,
                claimed_by: None,
                created_at: Utc::now(),
                claimed_at: None,
            },
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.handoff.to_scope = scope.into();
        self
    }

    pub fn with_priority(mut self, priority: HandoffPriority) -> Self {
        self.handoff.priority = priority;
        self
    }

    pub fn claimed_by(mut self, claimant: impl Into<String>) -> Self {
        self.handoff.claimed_by = Some(claimant.into());
        self.handoff.claimed_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> Handoff {
        self.handoff
    }
}

pub struct InstanceBuilder {
    instance: Instance,
}

impl InstanceBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            instance: Instance {
                id: id.into(),
                workspace: "test-workspace".to_string(),
                platform: "claude-code".to_string(),
                status: "active".to_string(),
                activity: "idle".to_string(),
                active_files: Vec::new(),
                registered_at: Utc::now(),
                last_heartbeat: Utc::now(),
                heartbeat_count: 0,
            },
        }
    }

    pub fn with_active_files(mut self, files: Vec<String>) -> Self {
        self.instance.active_files = files;
        self
    }

    pub fn build(self) -> Instance {
        self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_builder_defaults_then_overrides() {
        let task = TaskBuilder::new().with_title("custom").with_priority(TaskPriority::Critical).build();
        assert_eq!(task.title, "custom");
        assert_eq!(task.priority, TaskPriority::Critical);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn task_builder_with_claimed_by_sets_status() {
        let task = TaskBuilder::new().with_claimed_by("agent-1").build();
        assert_eq!(task.status, TaskStatus::Claimed);
        assert_eq!(task.claimed_by.as_deref(), Some("agent-1"));
    }

    #[test]
    fn entity_builder_accumulates_observations() {
        let entity = EntityBuilder::new("widget").with_observation("a").with_observation("b").build();
        assert_eq!(entity.observations, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn handoff_builder_claimed_by_sets_timestamp() {
        let handoff = HandoffBuilder::new("agent-a").claimed_by("agent-b").build();
        assert!(handoff.claimed_at.is_some());
    }
}
