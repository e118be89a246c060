//! The REST surface (spec.md §6): one GET per named read path plus the
//! POST/DELETE mutations that mirror §4's operations. Every handler
//! maps a `HowellError` to its `status_code()` and a `{error: "<kind>:
//! msg"}` body per §7; none of them unwrap.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use howell_core::{
    error::HowellError,
    models::{HandoffPriority, NewTask, NoteCategory, TaskFilter, TaskPriority, TaskScope},
    Coordinator,
};
use howell_workers::WorkerHandles;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::webhook;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub workers: WorkerHandles,
}

/// Wraps a `HowellError` into the `{error, status}` shape of §7.
struct ApiError(HowellError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"error": format!("{}: {}", self.0.kind(), self.0)}))).into_response()
    }
}

impl From<HowellError> for ApiError {
    fn from(e: HowellError) -> Self {
        ApiError(e)
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/recent", get(recent))
        .route("/pinned", get(pinned))
        .route("/summary", get(summary))
        .route("/search", get(search))
        .route("/knowledge", get(knowledge).post(knowledge_mutate))
        .route("/changes", get(changes))
        .route("/inbox", get(inbox))
        .route("/queue", get(queue))
        .route("/moltbook", get(moltbook))
        .route("/stats", get(stats))
        .route("/instances", get(list_instances).post(register_instance))
        .route("/instances/:id", delete(deregister_instance))
        .route("/instances/:id/heartbeat", post(heartbeat_instance))
        .route("/instances/:id/status", post(update_instance_status))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/board", get(tasks_board))
        .route("/tasks/available", get(tasks_available))
        .route("/tasks/templates", get(task_templates))
        .route("/tasks/:id", get(get_task).delete(delete_task))
        .route("/tasks/:id/claim", post(claim_task))
        .route("/tasks/:id/start", post(start_task))
        .route("/tasks/:id/progress", post(add_progress_note))
        .route("/tasks/:id/complete", post(complete_task))
        .route("/tasks/:id/fail", post(fail_task))
        .route("/tasks/:id/fail-terminal", post(fail_task_terminal))
        .route("/tasks/:id/release", post(release_task))
        .route("/agents", get(list_agents).post(register_agent))
        .route("/agents/context", get(agent_context))
        .route("/agents/:id", get(get_agent).post(end_agent))
        .route("/agents/:id/notes", get(list_notes).post(add_note))
        .route("/handoffs", get(list_handoffs).post(create_handoff))
        .route("/handoffs/:id/claim", post(claim_handoff))
        .route("/config", get(get_config))
        .route("/identity/:name", get(identity))
        .route("/health", get(health))
        .route("/webhook/github", post(webhook::handle))
        .with_state(state)
}

// ---------------------------------------------------------------------
// Status, bootstrap text artifacts, search, stats, config, health
// ---------------------------------------------------------------------

async fn status(State(state): State<AppState>) -> ApiResult<Value> {
    let report = howell_workers::heartbeat::run_once(&state.coordinator).await.map_err(|e| HowellError::internal(e.to_string()))?;
    let worker_health = state.workers.snapshot().await;
    Ok(Json(json!({
        "ok": true,
        "bind_addr": state.coordinator.config.bind_addr(),
        "auth_enabled": state.coordinator.config.auth_enabled(),
        "integrity": report,
        "workers": worker_health,
    })))
}

async fn recent(State(state): State<AppState>) -> ApiResult<Value> {
    let entries = state.coordinator.session_log.recent(state.coordinator.config.max_recent_sessions).await?;
    Ok(Json(json!(entries)))
}

async fn pinned(State(state): State<AppState>) -> Response {
    text_artifact(&state, "PINNED.md").await
}

async fn summary(State(state): State<AppState>) -> Response {
    text_artifact(&state, "SUMMARY.md").await
}

async fn text_artifact(state: &AppState, name: &str) -> Response {
    let path = std::path::Path::new(&state.coordinator.config.persist_root).join("memory").join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Json(json!({"content": content})).into_response(),
        Err(_) => Json(json!({"content": ""})).into_response(),
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> ApiResult<Value> {
    let query = q.q.unwrap_or_default();
    let entities = state.coordinator.graph.search(&query).await?;
    Ok(Json(json!({"entities": entities})))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Value> {
    let (entities, relations) = state.coordinator.graph.stats().await?;
    let task_stats = state.coordinator.tasks.stats().await?;
    let strat_stats = state.coordinator.stratigraphy.stats().await?;
    let instances = state.coordinator.instances.list(None).await?;
    Ok(Json(json!({
        "entities": entities,
        "relations": relations,
        "tasks": task_stats,
        "stratigraphy": strat_stats,
        "live_instances": instances.len(),
    })))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!({
        "persist_root": state.coordinator.config.persist_root,
        "daemon_host": state.coordinator.config.daemon_host,
        "daemon_port": state.coordinator.config.daemon_port,
        "dashboard_file": state.coordinator.config.dashboard_file,
        "graph_file": state.coordinator.config.graph_file,
        "max_recent_sessions": state.coordinator.config.max_recent_sessions,
        "heartbeat_interval_hours": state.coordinator.config.heartbeat_interval_hours,
        "watcher_interval_seconds": state.coordinator.config.watcher_interval_seconds,
        "queue_interval_seconds": state.coordinator.config.queue_interval_seconds,
        "moltbook_interval_seconds": state.coordinator.config.moltbook_interval_seconds,
        "auth_enabled": state.coordinator.config.auth_enabled(),
    })))
}

async fn identity(AxumPath(name): AxumPath<String>, State(state): State<AppState>) -> Response {
    let path = std::path::Path::new(&state.coordinator.config.persist_root).join("memory").join(format!("{name}.md"));
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Json(json!({"name": name, "content": content})).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Json(json!({"error": format!("NotFound: identity '{name}'")}))).into_response(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

// ---------------------------------------------------------------------
// Background-worker read views
// ---------------------------------------------------------------------

async fn changes(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.workers.recent_events().await)))
}

async fn inbox(State(state): State<AppState>) -> ApiResult<Value> {
    let dir = std::path::Path::new(&state.coordinator.config.persist_root).join("inbox");
    let mut messages = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().map(|e| e == "md").unwrap_or(false) {
                if let Ok(content) = tokio::fs::read_to_string(entry.path()).await {
                    messages.push(json!({"file": entry.file_name().to_string_lossy(), "content": content}));
                }
            }
        }
    }
    Ok(Json(json!(messages)))
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn queue(State(state): State<AppState>, Query(q): Query<StatusQuery>) -> ApiResult<Value> {
    read_queue_dir(&state, "comfyui", q.status.as_deref()).await
}

async fn moltbook(State(state): State<AppState>, Query(q): Query<StatusQuery>) -> ApiResult<Value> {
    read_queue_dir(&state, "moltbook", q.status.as_deref()).await
}

async fn read_queue_dir(state: &AppState, sub: &str, status_filter: Option<&str>) -> ApiResult<Value> {
    let dir = std::path::Path::new(&state.coordinator.config.persist_root).join("queue").join(sub);
    let mut items = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(bytes) = tokio::fs::read(entry.path()).await {
                    if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                        let matches = status_filter.map(|s| value.get("status").and_then(Value::as_str) == Some(s)).unwrap_or(true);
                        if matches {
                            items.push(value);
                        }
                    }
                }
            }
        }
    }
    Ok(Json(json!(items)))
}

// ---------------------------------------------------------------------
// Knowledge graph
// ---------------------------------------------------------------------

async fn knowledge(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.graph.load().await?)))
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum KnowledgeMutation {
    AddEntity { name: String, entity_type: String, #[serde(default)] observations: Vec<String> },
    AddObservation { name: String, observation: String },
    AddRelation { from_entity: String, relation_type: String, to_entity: String },
    DeleteEntity { name: String },
    DeleteObservation { name: String, substring: String },
    DeleteRelation { from_entity: String, relation_type: String, to_entity: String },
    RenameEntity { old_name: String, new_name: String },
    MergeEntities { source: String, target: String },
}

async fn knowledge_mutate(State(state): State<AppState>, Json(body): Json<KnowledgeMutation>) -> ApiResult<Value> {
    let graph = &state.coordinator.graph;
    let result = match body {
        KnowledgeMutation::AddEntity { name, entity_type, observations } => {
            json!(graph.upsert_entity(&name, &entity_type, observations).await?)
        }
        KnowledgeMutation::AddObservation { name, observation } => json!(graph.add_observation(&name, observation).await?),
        KnowledgeMutation::AddRelation { from_entity, relation_type, to_entity } => {
            json!(graph.add_relation(&from_entity, &relation_type, &to_entity).await?)
        }
        KnowledgeMutation::DeleteEntity { name } => {
            graph.delete_entity(&name).await?;
            json!({"deleted": name})
        }
        KnowledgeMutation::DeleteObservation { name, substring } => {
            json!({"removed": graph.delete_observation_by_substring(&name, &substring).await?})
        }
        KnowledgeMutation::DeleteRelation { from_entity, relation_type, to_entity } => {
            graph.delete_relation(&from_entity, &relation_type, &to_entity).await?;
            json!({"deleted": true})
        }
        KnowledgeMutation::RenameEntity { old_name, new_name } => json!(graph.rename_entity(&old_name, &new_name).await?),
        KnowledgeMutation::MergeEntities { source, target } => json!(graph.merge_entities(&source, &target).await?),
    };
    Ok(Json(result))
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Deserialize, Default)]
struct TasksQuery {
    status: Option<String>,
    project: Option<String>,
    claimed_by: Option<String>,
}

async fn list_tasks(State(state): State<AppState>, Query(q): Query<TasksQuery>) -> ApiResult<Value> {
    let filter = TaskFilter {
        status: q.status.and_then(|s| serde_json::from_value(json!(s)).ok()),
        project: q.project,
        claimed_by: q.claimed_by,
    };
    Ok(Json(json!(state.coordinator.tasks.list(filter).await?)))
}

async fn tasks_board(State(state): State<AppState>) -> ApiResult<Value> {
    let tasks = state.coordinator.tasks.list(TaskFilter::default()).await?;
    let mut board: HashMap<String, Vec<_>> = HashMap::new();
    for task in tasks {
        board.entry(format!("{:?}", task.status)).or_default().push(task);
    }
    Ok(Json(json!(board)))
}

async fn tasks_available(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.available().await?)))
}

#[derive(Deserialize)]
struct CreateTaskBody {
    title: String,
    description: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    scope: TaskScope,
    #[serde(default)]
    dependencies: Vec<String>,
    created_by: String,
}

async fn create_task(State(state): State<AppState>, Json(body): Json<CreateTaskBody>) -> ApiResult<Value> {
    let task = state
        .coordinator
        .tasks
        .create(NewTask {
            title: body.title,
            description: body.description,
            project: body.project,
            scope: body.scope,
            priority: body.priority.unwrap_or(TaskPriority::Medium),
            dependencies: body.dependencies,
            created_by: body.created_by,
        })
        .await?;
    Ok(Json(json!(task)))
}

async fn task_templates(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.templates().await?)))
}

async fn get_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.get(&id).await?)))
}

async fn delete_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>) -> ApiResult<Value> {
    state.coordinator.tasks.delete(&id).await?;
    Ok(Json(json!({"deleted": id})))
}

#[derive(Deserialize)]
struct InstanceIdBody {
    instance_id: String,
}

async fn claim_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<InstanceIdBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.claim(&id, &body.instance_id).await?)))
}

async fn start_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<InstanceIdBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.start(&id, &body.instance_id).await?)))
}

#[derive(Deserialize)]
struct ProgressNoteBody {
    instance_id: String,
    text: String,
}

async fn add_progress_note(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<ProgressNoteBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.add_progress_note(&id, &body.instance_id, body.text).await?)))
}

#[derive(Deserialize)]
struct CompleteTaskBody {
    instance_id: String,
    result: String,
    #[serde(default)]
    artifacts: Vec<String>,
}

async fn complete_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<CompleteTaskBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.complete(&id, &body.instance_id, body.result, body.artifacts).await?)))
}

#[derive(Deserialize)]
struct FailTaskBody {
    instance_id: String,
    reason: String,
}

async fn fail_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<FailTaskBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.fail_and_requeue(&id, &body.instance_id, body.reason).await?)))
}

#[derive(Deserialize)]
struct FailTerminalBody {
    reason: String,
}

async fn fail_task_terminal(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<FailTerminalBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.fail_terminal(&id, body.reason).await?)))
}

async fn release_task(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<InstanceIdBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.tasks.release(&id, &body.instance_id).await?)))
}

// ---------------------------------------------------------------------
// Agent stratigraphy
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct AgentsQuery {
    workspace: Option<String>,
    limit: Option<usize>,
}

async fn list_agents(State(state): State<AppState>, Query(q): Query<AgentsQuery>) -> ApiResult<Value> {
    let mut agents = state.coordinator.stratigraphy.list_agents(q.workspace.as_deref()).await?;
    if let Some(limit) = q.limit {
        agents.truncate(limit);
    }
    Ok(Json(json!(agents)))
}

#[derive(Deserialize)]
struct RegisterAgentBody {
    platform: String,
    workspace: String,
    model: String,
    #[serde(default)]
    parent: Option<String>,
}

async fn register_agent(State(state): State<AppState>, Json(body): Json<RegisterAgentBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.stratigraphy.register_agent(body.platform, body.workspace, body.model, body.parent).await?)))
}

async fn get_agent(AxumPath(id): AxumPath<String>, State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.stratigraphy.get_agent(&id).await?)))
}

#[derive(Deserialize, Default)]
struct EndAgentBody {
    summary: Option<String>,
}

async fn end_agent(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<EndAgentBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.stratigraphy.end_agent(&id, body.summary).await?)))
}

#[derive(Deserialize)]
struct NotesQuery {
    category: Option<String>,
}

async fn list_notes(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Query(q): Query<NotesQuery>) -> ApiResult<Value> {
    let category = q.category.and_then(|c| NoteCategory::parse(&c));
    Ok(Json(json!(state.coordinator.stratigraphy.list_notes(Some(&id), category).await?)))
}

#[derive(Deserialize)]
struct AddNoteBody {
    category: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

async fn add_note(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<AddNoteBody>) -> ApiResult<Value> {
    let category = NoteCategory::parse(&body.category)
        .ok_or_else(|| HowellError::invalid_argument(format!("unknown note category '{}'", body.category)))?;
    Ok(Json(json!(state.coordinator.stratigraphy.add_note(&id, category, body.content, body.tags).await?)))
}

#[derive(Deserialize)]
struct HandoffsQuery {
    scope: String,
    #[serde(default)]
    unclaimed_only: bool,
}

async fn list_handoffs(State(state): State<AppState>, Query(q): Query<HandoffsQuery>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.stratigraphy.list_handoffs(&q.scope, q.unclaimed_only).await?)))
}

#[derive(Deserialize)]
struct CreateHandoffBody {
    from_agent: String,
    to_scope: String,
    content: String,
    #[serde(default)]
    priority: Option<String>,
}

async fn create_handoff(State(state): State<AppState>, Json(body): Json<CreateHandoffBody>) -> ApiResult<Value> {
    let priority = body.priority.map(|p| HandoffPriority::coerce(&p)).unwrap_or_default();
    Ok(Json(json!(state.coordinator.stratigraphy.create_handoff(body.from_agent, body.to_scope, body.content, priority).await?)))
}

#[derive(Deserialize)]
struct ClaimHandoffBody {
    claimant: String,
}

async fn claim_handoff(AxumPath(id): AxumPath<i64>, State(state): State<AppState>, Json(body): Json<ClaimHandoffBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.stratigraphy.claim_handoff(id, &body.claimant).await?)))
}

#[derive(Deserialize)]
struct AgentContextQuery {
    workspace: String,
    /// When present, claims every unclaimed handoff in scope on this
    /// id's behalf; when absent, returns the read-only preview instead
    /// (spec.md §4.3).
    claimant: Option<String>,
}

async fn agent_context(State(state): State<AppState>, Query(q): Query<AgentContextQuery>) -> ApiResult<Value> {
    let context = match q.claimant {
        Some(claimant) => state.coordinator.stratigraphy.bootstrap_context(&q.workspace, &claimant).await?,
        None => state.coordinator.stratigraphy.preview_bootstrap_context(&q.workspace).await?,
    };
    Ok(Json(json!(context)))
}

// ---------------------------------------------------------------------
// Instance registry
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct InstancesQuery {
    workspace: Option<String>,
}

async fn list_instances(State(state): State<AppState>, Query(q): Query<InstancesQuery>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.instances.list(q.workspace.as_deref()).await?)))
}

#[derive(Deserialize)]
struct RegisterInstanceBody {
    workspace: String,
    platform: String,
    #[serde(default)]
    activity: String,
}

async fn register_instance(State(state): State<AppState>, Json(body): Json<RegisterInstanceBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.instances.register(body.workspace, body.platform, body.activity).await?)))
}

async fn deregister_instance(AxumPath(id): AxumPath<String>, State(state): State<AppState>) -> ApiResult<Value> {
    state.coordinator.instances.deregister(&id).await?;
    let released = state.coordinator.auto_release_instance(&id).await?;
    Ok(Json(json!({"deregistered": id, "released_tasks": released.iter().map(|t| &t.id).collect::<Vec<_>>()})))
}

#[derive(Deserialize, Default)]
struct HeartbeatBody {
    activity: Option<String>,
    active_files: Option<Vec<String>>,
}

async fn heartbeat_instance(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<HeartbeatBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.instances.heartbeat(&id, body.activity, body.active_files).await?)))
}

#[derive(Deserialize)]
struct UpdateStatusBody {
    status: String,
}

async fn update_instance_status(AxumPath(id): AxumPath<String>, State(state): State<AppState>, Json(body): Json<UpdateStatusBody>) -> ApiResult<Value> {
    Ok(Json(json!(state.coordinator.instances.update_status(&id, body.status).await?)))
}
