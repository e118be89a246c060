//! In-memory fakes of the four store traits, used by protocol and HTTP
//! layer tests that should not touch disk. Each fake supports error
//! injection and call-history tracking, the same testing shape as the
//! teacher's `MockTaskRepository`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use howell_core::{
    error::{HowellError, Result},
    models::{
        AgentRecord, CreateFromTemplate, Entity, FileConflict, Handoff, HandoffPriority, Instance,
        KnowledgeGraph, NewTask, Note, NoteCategory, ProgressNote, Relation, SessionLogEntry, Task,
        TaskFilter, TaskStatus, TaskTemplate,
    },
    repository::{AgentWithNotes, BootstrapContext, InstanceRegistry, KnowledgeGraphStore, SessionLog, StratigraphyStore, TaskStore},
    validation::{self, Validator},
};

fn record(history: &Mutex<Vec<String>>, call: impl Into<String>) {
    history.lock().push(call.into());
}

fn maybe_fail(injected: &Mutex<Option<HowellError>>) -> Result<()> {
    if let Some(err) = injected.lock().take() {
        return Err(err);
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Knowledge graph
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeKnowledgeGraphStore {
    graph: Mutex<KnowledgeGraph>,
    injected_error: Mutex<Option<HowellError>>,
    call_history: Mutex<Vec<String>>,
}

impl FakeKnowledgeGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_error(&self, error: HowellError) {
        *self.injected_error.lock() = Some(error);
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }
}

#[async_trait]
impl KnowledgeGraphStore for FakeKnowledgeGraphStore {
    async fn load(&self) -> Result<KnowledgeGraph> {
        record(&self.call_history, "load");
        maybe_fail(&self.injected_error)?;
        Ok(self.graph.lock().clone())
    }

    async fn upsert_entity(&self, name: &str, entity_type: &str, observations: Vec<String>) -> Result<Entity> {
        record(&self.call_history, format!("upsert_entity({name})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        let entity = graph.entities.entry(name.to_string()).or_insert_with(|| Entity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: Vec::new(),
            created_at: Utc::now(),
        });
        entity.entity_type = entity_type.to_string();
        for obs in observations {
            if !entity.observations.contains(&obs) {
                entity.observations.push(obs);
            }
        }
        Ok(entity.clone())
    }

    async fn add_observation(&self, name: &str, observation: String) -> Result<Entity> {
        record(&self.call_history, format!("add_observation({name})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        let entity = graph
            .entities
            .get_mut(name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{name}'")))?;
        if !entity.observations.contains(&observation) {
            entity.observations.push(observation);
        }
        Ok(entity.clone())
    }

    async fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        record(&self.call_history, format!("get_entity({name})"));
        maybe_fail(&self.injected_error)?;
        Ok(self.graph.lock().entities.get(name).cloned())
    }

    async fn delete_entity(&self, name: &str) -> Result<()> {
        record(&self.call_history, format!("delete_entity({name})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        if graph.entities.remove(name).is_none() {
            return Err(HowellError::not_found(format!("entity '{name}'")));
        }
        graph.relations.retain(|r| r.from_entity != name && r.to_entity != name);
        Ok(())
    }

    async fn delete_observation_by_substring(&self, name: &str, substring: &str) -> Result<usize> {
        record(&self.call_history, format!("delete_observation_by_substring({name})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        let entity = graph
            .entities
            .get_mut(name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{name}'")))?;
        let before = entity.observations.len();
        let needle = substring.to_lowercase();
        entity.observations.retain(|o| !o.to_lowercase().contains(&needle));
        Ok(before - entity.observations.len())
    }

    async fn add_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<Relation> {
        record(&self.call_history, format!("add_relation({from_entity},{relation_type},{to_entity})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        if !graph.entities.contains_key(from_entity) || !graph.entities.contains_key(to_entity) {
            return Err(HowellError::not_found("relation endpoint"));
        }
        let relation = Relation {
            from_entity: from_entity.to_string(),
            relation_type: relation_type.to_string(),
            to_entity: to_entity.to_string(),
            created_at: Utc::now(),
        };
        graph.relations.push(relation.clone());
        Ok(relation)
    }

    async fn delete_relation(&self, from_entity: &str, relation_type: &str, to_entity: &str) -> Result<()> {
        record(&self.call_history, "delete_relation");
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        graph.relations.retain(|r| {
            !(r.from_entity == from_entity && r.relation_type == relation_type && r.to_entity == to_entity)
        });
        Ok(())
    }

    async fn rename_entity(&self, old_name: &str, new_name: &str) -> Result<Entity> {
        record(&self.call_history, format!("rename_entity({old_name},{new_name})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        if graph.entities.contains_key(new_name) {
            return Err(HowellError::conflict(format!("entity '{new_name}' already exists")));
        }
        let mut entity = graph
            .entities
            .remove(old_name)
            .ok_or_else(|| HowellError::not_found(format!("entity '{old_name}'")))?;
        entity.name = new_name.to_string();
        for r in graph.relations.iter_mut() {
            if r.from_entity == old_name {
                r.from_entity = new_name.to_string();
            }
            if r.to_entity == old_name {
                r.to_entity = new_name.to_string();
            }
        }
        graph.entities.insert(new_name.to_string(), entity.clone());
        Ok(entity)
    }

    async fn merge_entities(&self, source: &str, target: &str) -> Result<Entity> {
        record(&self.call_history, format!("merge_entities({source},{target})"));
        maybe_fail(&self.injected_error)?;
        let mut graph = self.graph.lock();
        if !graph.entities.contains_key(target) {
            return Err(HowellError::not_found(format!("entity '{target}'")));
        }
        let src = graph
            .entities
            .remove(source)
            .ok_or_else(|| HowellError::not_found(format!("entity '{source}'")))?;
        for r in graph.relations.iter_mut() {
            if r.from_entity == source {
                r.from_entity = target.to_string();
            }
            if r.to_entity == source {
                r.to_entity = target.to_string();
            }
        }
        graph.relations.retain(|r| r.from_entity != r.to_entity);
        let mut seen = std::collections::HashSet::new();
        graph
            .relations
            .retain(|r| seen.insert((r.from_entity.clone(), r.relation_type.clone(), r.to_entity.clone())));
        let target_entity = graph.entities.get_mut(target).expect("checked above");
        for obs in src.observations {
            if !target_entity.observations.contains(&obs) {
                target_entity.observations.push(obs);
            }
        }
        Ok(target_entity.clone())
    }

    async fn search(&self, query: &str) -> Result<Vec<Entity>> {
        record(&self.call_history, format!("search({query})"));
        maybe_fail(&self.injected_error)?;
        let q = query.to_lowercase();
        Ok(self
            .graph
            .lock()
            .entities
            .values()
            .filter(|e| {
                e.name.to_lowercase().contains(&q)
                    || e.entity_type.to_lowercase().contains(&q)
                    || e.observations.iter().any(|o| o.to_lowercase().contains(&q))
            })
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<(usize, usize)> {
        let graph = self.graph.lock();
        Ok((graph.entities.len(), graph.relations.len()))
    }
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTaskStore {
    tasks: Mutex<Vec<Task>>,
    next_id: std::sync::atomic::AtomicU32,
    injected_error: Mutex<Option<HowellError>>,
    call_history: Mutex<Vec<String>>,
}

impl FakeTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn inject_error(&self, error: HowellError) {
        *self.injected_error.lock() = Some(error);
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    fn next_task_id(&self) -> String {
        let n = self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("fake-{n:06}")
    }
}

#[async_trait]
impl TaskStore for FakeTaskStore {
    async fn create(&self, new_task: NewTask) -> Result<Task> {
        record(&self.call_history, "create");
        maybe_fail(&self.injected_error)?;
        Validator::validate_new_task(&new_task)?;
        let task = Task {
            id: self.next_task_id(),
            title: new_task.title,
            description: new_task.description,
            project: new_task.project,
            scope: new_task.scope,
            priority: new_task.priority,
            status: TaskStatus::Pending,
            dependencies: new_task.dependencies,
            created_by: new_task.created_by,
            created_at: Utc::now(),
            claimed_by: None,
            claimed_at: None,
            started_at: None,
            completed_at: None,
            result: None,
            artifacts: Vec::new(),
            progress_notes: Vec::new(),
        };
        self.tasks.lock().push(task.clone());
        Ok(task)
    }

    async fn create_from_template(&self, req: CreateFromTemplate) -> Result<Task> {
        let new_task = validation::instantiate_template(req)?;
        self.create(new_task).await
    }

    async fn get(&self, id: &str) -> Result<Task> {
        record(&self.call_history, format!("get({id})"));
        maybe_fail(&self.injected_error)?;
        self.tasks
            .lock()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        record(&self.call_history, "list");
        maybe_fail(&self.injected_error)?;
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| filter.status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| filter.project.as_ref().map(|p| p == &t.project).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn available(&self) -> Result<Vec<Task>> {
        record(&self.call_history, "available");
        maybe_fail(&self.injected_error)?;
        let tasks = self.tasks.lock();
        let completed: std::collections::HashSet<&str> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect();
        let held: Vec<&howell_core::models::TaskScope> = tasks.iter().filter(|t| t.holds_scope()).map(|t| &t.scope).collect();
        let mut result: Vec<Task> = tasks
            .iter()
            .filter(|t| validation::is_available(t, &completed, &held))
            .cloned()
            .collect();
        result.sort_by_key(|t| validation::availability_sort_key(t));
        Ok(result)
    }

    async fn claim(&self, id: &str, agent: &str) -> Result<Task> {
        record(&self.call_history, format!("claim({id},{agent})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let completed: std::collections::HashSet<String> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();
        let held: Vec<howell_core::models::TaskScope> = tasks
            .iter()
            .filter(|t| t.holds_scope() && t.id != id)
            .map(|t| t.scope.clone())
            .collect();
        let completed_refs: std::collections::HashSet<&str> = completed.iter().map(String::as_str).collect();
        let held_refs: Vec<&howell_core::models::TaskScope> = held.iter().collect();
        let available = tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| validation::is_available(t, &completed_refs, &held_refs))
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if !available {
            return Err(HowellError::conflict(format!("task '{id}' is not claimable")));
        }
        let task = tasks.iter_mut().find(|t| t.id == id).unwrap();
        task.status = TaskStatus::Claimed;
        task.claimed_by = Some(agent.to_string());
        task.claimed_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn start(&self, id: &str, agent: &str) -> Result<Task> {
        record(&self.call_history, format!("start({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if task.claimed_by.as_deref() != Some(agent) || task.status != TaskStatus::Claimed {
            return Err(HowellError::conflict(format!("task '{id}' is not claimed by this agent")));
        }
        task.status = TaskStatus::InProgress;
        task.started_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn add_progress_note(&self, id: &str, agent: &str, text: String) -> Result<ProgressNote> {
        record(&self.call_history, format!("add_progress_note({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!("task '{id}' is not claimed by this agent")));
        }
        let note = ProgressNote {
            timestamp: Utc::now(),
            text,
        };
        task.progress_notes.push(note.clone());
        Ok(note)
    }

    async fn complete(&self, id: &str, agent: &str, result: String, artifacts: Vec<String>) -> Result<Task> {
        record(&self.call_history, format!("complete({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!("task '{id}' is claimed by another agent")));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result);
        task.artifacts = artifacts;
        Ok(task.clone())
    }

    async fn fail_and_requeue(&self, id: &str, agent: &str, reason: String) -> Result<Task> {
        record(&self.call_history, format!("fail_and_requeue({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!("task '{id}' is claimed by another agent")));
        }
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: format!("failed: {reason}"),
        });
        task.status = TaskStatus::Pending;
        task.claimed_by = None;
        task.claimed_at = None;
        task.started_at = None;
        Ok(task.clone())
    }

    async fn fail_terminal(&self, id: &str, reason: String) -> Result<Task> {
        record(&self.call_history, format!("fail_terminal({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: format!("failed (terminal): {reason}"),
        });
        task.status = TaskStatus::Failed;
        task.claimed_by = None;
        task.claimed_at = None;
        Ok(task.clone())
    }

    async fn release(&self, id: &str, agent: &str) -> Result<Task> {
        record(&self.call_history, format!("release({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!("task '{id}' is claimed by another agent")));
        }
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: "released by claimer".to_string(),
        });
        task.status = TaskStatus::Pending;
        task.claimed_by = None;
        task.claimed_at = None;
        task.started_at = None;
        Ok(task.clone())
    }

    async fn release_all_for(&self, agent: &str) -> Result<Vec<Task>> {
        record(&self.call_history, format!("release_all_for({agent})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let mut released = Vec::new();
        for task in tasks.iter_mut() {
            if task.claimed_by.as_deref() == Some(agent) && task.holds_scope() {
                task.progress_notes.push(ProgressNote {
                    timestamp: Utc::now(),
                    text: format!("auto-released: instance '{agent}' disconnected"),
                });
                task.status = TaskStatus::Pending;
                task.claimed_by = None;
                task.claimed_at = None;
                task.started_at = None;
                released.push(task.clone());
            }
        }
        Ok(released)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        record(&self.call_history, format!("delete({id})"));
        maybe_fail(&self.injected_error)?;
        let mut tasks = self.tasks.lock();
        let task = tasks.iter().find(|t| t.id == id).ok_or_else(|| HowellError::not_found(format!("task '{id}'")))?;
        if matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
            return Err(HowellError::conflict(format!("task '{id}' is active and cannot be deleted")));
        }
        tasks.retain(|t| t.id != id);
        Ok(())
    }

    async fn templates(&self) -> Result<Vec<TaskTemplate>> {
        Ok(validation::template_catalog())
    }

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>> {
        let tasks = self.tasks.lock();
        let mut by_status = std::collections::HashMap::new();
        for task in tasks.iter() {
            *by_status.entry(task.status.to_string()).or_insert(0u64) += 1;
        }
        by_status.insert("total".to_string(), tasks.len() as u64);
        Ok(by_status)
    }
}

// ---------------------------------------------------------------------
// Stratigraphy
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStratigraphyStore {
    agents: Mutex<HashMap<String, AgentRecord>>,
    notes: Mutex<Vec<Note>>,
    handoffs: Mutex<Vec<Handoff>>,
    next_note_id: std::sync::atomic::AtomicI64,
    next_handoff_id: std::sync::atomic::AtomicI64,
}

impl FakeStratigraphyStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn compose_bootstrap_context(&self, workspace: &str, handoffs: Vec<Handoff>) -> Result<BootstrapContext> {
        let recent = self.list_agents(Some(workspace)).await?.into_iter().take(5).collect::<Vec<_>>();
        let eligible = [NoteCategory::Learned, NoteCategory::Decision, NoteCategory::Warning, NoteCategory::Blocker];
        let mut recent_agents = Vec::with_capacity(recent.len());
        for agent in recent {
            let mut notes = self.list_notes(Some(&agent.id), None).await?;
            notes.retain(|n| eligible.contains(&n.category));
            notes.truncate(10);
            recent_agents.push(AgentWithNotes { agent, notes });
        }
        Ok(BootstrapContext {
            handoffs,
            recent_agents,
            stats: self.stats().await?,
        })
    }
}

#[async_trait]
impl StratigraphyStore for FakeStratigraphyStore {
    async fn register_agent(&self, platform: String, workspace: String, model: String, parent: Option<String>) -> Result<AgentRecord> {
        let mut agents = self.agents.lock();
        let date = Utc::now().format("%y%m%d").to_string();
        let prefix = format!("CH-{date}-");
        let seq = agents
            .keys()
            .filter_map(|id| id.strip_prefix(&prefix))
            .filter_map(|s| s.parse::<u32>().ok())
            .max()
            .map(|n| n + 1)
            .unwrap_or(0);
        let record = AgentRecord {
            id: format!("{prefix}{seq}"),
            parent,
            platform,
            workspace,
            model,
            created_at: Utc::now(),
            ended_at: None,
            end_summary: None,
        };
        agents.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn end_agent(&self, id: &str, summary: Option<String>) -> Result<AgentRecord> {
        let mut agents = self.agents.lock();
        let agent = agents.get_mut(id).ok_or_else(|| HowellError::not_found(format!("agent '{id}'")))?;
        if agent.ended_at.is_some() {
            return Err(HowellError::conflict(format!("agent '{id}' already ended")));
        }
        agent.ended_at = Some(Utc::now());
        agent.end_summary = summary;
        Ok(agent.clone())
    }

    async fn get_agent(&self, id: &str) -> Result<AgentRecord> {
        self.agents.lock().get(id).cloned().ok_or_else(|| HowellError::not_found(format!("agent '{id}'")))
    }

    async fn list_agents(&self, workspace: Option<&str>) -> Result<Vec<AgentRecord>> {
        let mut agents: Vec<AgentRecord> = self
            .agents
            .lock()
            .values()
            .filter(|a| workspace.map(|w| w == a.workspace).unwrap_or(true))
            .cloned()
            .collect();
        agents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(agents)
    }

    async fn add_note(&self, agent_id: &str, category: NoteCategory, content: String, tags: Vec<String>) -> Result<Note> {
        if !self.agents.lock().contains_key(agent_id) {
            return Err(HowellError::not_found(format!("agent '{agent_id}'")));
        }
        let note = Note {
            id: self.next_note_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
            agent_id: agent_id.to_string(),
            category,
            content,
            tags,
            created_at: Utc::now(),
        };
        self.notes.lock().push(note.clone());
        Ok(note)
    }

    async fn list_notes(&self, agent_id: Option<&str>, category: Option<NoteCategory>) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .lock()
            .iter()
            .filter(|n| agent_id.map(|id| id == n.agent_id).unwrap_or(true))
            .filter(|n| category.map(|c| c == n.category).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_handoff(&self, from_agent: String, to_scope: String, content: String, priority: HandoffPriority) -> Result<Handoff> {
        if !self.agents.lock().contains_key(&from_agent) {
            return Err(HowellError::not_found(format!("agent '{from_agent}'")));
        }
        let handoff = Handoff {
            id: self.next_handoff_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst),
            from_agent,
            to_scope,
            content,
            priority,
            claimed_by: None,
            created_at: Utc::now(),
            claimed_at: None,
        };
        self.handoffs.lock().push(handoff.clone());
        Ok(handoff)
    }

    async fn claim_handoff(&self, id: i64, claimant: &str) -> Result<Handoff> {
        let mut handoffs = self.handoffs.lock();
        let handoff = handoffs.iter_mut().find(|h| h.id == id).ok_or_else(|| HowellError::not_found(format!("handoff '{id}'")))?;
        if handoff.claimed_by.is_some() {
            return Err(HowellError::conflict(format!("handoff '{id}' already claimed")));
        }
        handoff.claimed_by = Some(claimant.to_string());
        handoff.claimed_at = Some(Utc::now());
        Ok(handoff.clone())
    }

    async fn list_handoffs(&self, scope: &str, unclaimed_only: bool) -> Result<Vec<Handoff>> {
        Ok(self
            .handoffs
            .lock()
            .iter()
            .filter(|h| h.to_scope == "*" || h.to_scope == scope)
            .filter(|h| !unclaimed_only || h.claimed_by.is_none())
            .cloned()
            .collect())
    }

    async fn bootstrap_context(&self, workspace: &str, claimant: &str) -> Result<BootstrapContext> {
        let unclaimed = self.list_handoffs(workspace, true).await?;
        let mut claimed = Vec::with_capacity(unclaimed.len());
        for handoff in unclaimed {
            if let Ok(won) = self.claim_handoff(handoff.id, claimant).await {
                claimed.push(won);
            }
        }
        self.compose_bootstrap_context(workspace, claimed).await
    }

    async fn preview_bootstrap_context(&self, workspace: &str) -> Result<BootstrapContext> {
        let unclaimed = self.list_handoffs(workspace, true).await?;
        self.compose_bootstrap_context(workspace, unclaimed).await
    }

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>> {
        let mut stats = std::collections::HashMap::new();
        stats.insert("agents".to_string(), self.agents.lock().len() as u64);
        stats.insert("notes".to_string(), self.notes.lock().len() as u64);
        stats.insert(
            "unclaimed_handoffs".to_string(),
            self.handoffs.lock().iter().filter(|h| h.claimed_by.is_none()).count() as u64,
        );
        Ok(stats)
    }

    async fn reap_stale_claims(&self, active_ids: &[String], max_age: chrono::Duration) -> Result<Vec<i64>> {
        let now = Utc::now();
        let mut released = Vec::new();
        for handoff in self.handoffs.lock().iter_mut() {
            let Some(claimant) = handoff.claimed_by.clone() else { continue };
            if active_ids.contains(&claimant) {
                continue;
            }
            let Some(claimed_at) = handoff.claimed_at else { continue };
            if now.signed_duration_since(claimed_at) < max_age {
                continue;
            }
            handoff.claimed_by = None;
            handoff.claimed_at = None;
            released.push(handoff.id);
        }
        Ok(released)
    }
}

// ---------------------------------------------------------------------
// Instance registry
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInstanceRegistry {
    instances: Mutex<HashMap<String, Instance>>,
    next_id: std::sync::atomic::AtomicU32,
}

impl FakeInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRegistry for FakeInstanceRegistry {
    async fn register(&self, workspace: String, platform: String, activity: String) -> Result<Instance> {
        let id = format!("fake{:06x}", self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst));
        let now = Utc::now();
        let instance = Instance {
            id: id.clone(),
            workspace,
            platform,
            status: "active".to_string(),
            activity,
            active_files: Vec::new(),
            registered_at: now,
            last_heartbeat: now,
            heartbeat_count: 0,
        };
        self.instances.lock().insert(id, instance.clone());
        Ok(instance)
    }

    async fn heartbeat(&self, id: &str, activity: Option<String>, active_files: Option<Vec<String>>) -> Result<Instance> {
        let mut instances = self.instances.lock();
        let instance = instances.get_mut(id).ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        instance.last_heartbeat = Utc::now();
        instance.heartbeat_count += 1;
        if let Some(a) = activity {
            instance.activity = a;
        }
        if let Some(files) = active_files {
            instance.active_files = files;
        }
        Ok(instance.clone())
    }

    async fn update_status(&self, id: &str, status: String) -> Result<Instance> {
        let mut instances = self.instances.lock();
        let instance = instances.get_mut(id).ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        instance.status = status;
        Ok(instance.clone())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        self.instances.lock().remove(id).ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Instance> {
        self.instances.lock().get(id).cloned().ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))
    }

    async fn list(&self, workspace: Option<&str>) -> Result<Vec<Instance>> {
        Ok(self
            .instances
            .lock()
            .values()
            .filter(|i| workspace.map(|w| w == i.workspace).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn check_conflicts(&self, id: &str, files: &[String]) -> Result<Vec<FileConflict>> {
        let instances = self.instances.lock();
        let mut conflicts = Vec::new();
        for other in instances.values() {
            if other.id == id {
                continue;
            }
            for file in files {
                if other.active_files.contains(file) {
                    conflicts.push(FileConflict {
                        file: file.clone(),
                        other_id: other.id.clone(),
                        workspace: other.workspace.clone(),
                        platform: other.platform.clone(),
                        activity: other.activity.clone(),
                    });
                }
            }
        }
        Ok(conflicts)
    }
}

// ---------------------------------------------------------------------
// Session log
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSessionLog {
    entries: Mutex<Vec<SessionLogEntry>>,
}

impl FakeSessionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionLog for FakeSessionLog {
    async fn append(&self, action: String, details: String) -> Result<()> {
        self.entries.lock().push(SessionLogEntry {
            timestamp: Utc::now(),
            action,
            details,
        });
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SessionLogEntry>> {
        let entries = self.entries.lock();
        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use howell_core::models::TaskPriority;

    #[tokio::test]
    async fn fake_task_store_tracks_call_history() {
        let store = FakeTaskStore::new();
        store
            .create(NewTask {
                title: "t".into(),
                description: "d".into(),
                project: "p".into(),
                scope: Default::default(),
                priority: TaskPriority::Medium,
                dependencies: Vec::new(),
                created_by: "tester".into(),
            })
            .await
            .unwrap();
        assert!(store.call_history().iter().any(|c| c == "create"));
    }

    #[tokio::test]
    async fn fake_task_store_error_injection() {
        let store = FakeTaskStore::new();
        store.inject_error(HowellError::internal("boom"));
        let err = store.get("missing").await.unwrap_err();
        assert_eq!(err, HowellError::internal("boom"));
    }

    #[tokio::test]
    async fn fake_registry_round_trips() {
        let registry = FakeInstanceRegistry::new();
        let instance = registry.register("w".into(), "cli".into(), "idle".into()).await.unwrap();
        assert!(registry.get(&instance.id).await.is_ok());
    }

    #[tokio::test]
    async fn fake_stratigraphy_handoff_claim_race() {
        let store = FakeStratigraphyStore::new();
        let agent = store.register_agent("claude".into(), "w".into(), "opus".into(), None).await.unwrap();
        let handoff = store
            .create_handoff(agent.id, "w".into(), "content".into(), HandoffPriority::Normal)
            .await
            .unwrap();
        assert!(store.claim_handoff(handoff.id, "g1").await.is_ok());
        assert!(store.claim_handoff(handoff.id, "g2").await.is_err());
    }
}
