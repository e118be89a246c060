use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use howell_core::{
    error::{HowellError, Result},
    models::{CreateFromTemplate, NewTask, ProgressNote, Task, TaskFilter, TaskStatus, TaskTemplate},
    repository::TaskStore,
    validation::{self, Validator},
};

use crate::atomic_file::{ensure_parent_dir, load_with_fallback, write_atomic};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    tasks: Vec<Task>,
}

/// JSON-file-backed task store implementing the full coordination
/// engine state machine (spec.md §4.1). A single mutex serializes every
/// mutation, including the scope-conflict check, so claim races and
/// dependency re-checks happen atomically with the write.
pub struct JsonTaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

fn new_task_id() -> String {
    let now = Utc::now();
    let date = now.format("%y%m%d");
    let mut rand_bytes = [0u8; 3];
    getrandom(&mut rand_bytes);
    format!("{date}-{}", hex(&rand_bytes))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Minimal dependency-free random source: mixes process-local state
/// with the current instant. Good enough for a human-unreadable id
/// suffix; not a cryptographic generator.
fn getrandom(out: &mut [u8]) {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut seed = nanos ^ counter.wrapping_mul(0x9E3779B97F4A7C15);
    for b in out.iter_mut() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        *b = (seed & 0xff) as u8;
    }
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Document> {
        load_with_fallback(&self.path).await
    }

    async fn write(&self, doc: &Document) -> Result<()> {
        ensure_parent_dir(&self.path).await?;
        write_atomic(&self.path, doc).await
    }

    fn find<'a>(doc: &'a Document, id: &str) -> Result<&'a Task> {
        doc.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))
    }

    fn find_mut<'a>(doc: &'a mut Document, id: &str) -> Result<&'a mut Task> {
        doc.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HowellError::not_found(format!("task '{id}'")))
    }

    fn completed_ids(doc: &Document) -> std::collections::HashSet<&str> {
        doc.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect()
    }

    fn held_scopes(doc: &Document, excluding: Option<&str>) -> Vec<&howell_core::models::TaskScope> {
        doc.tasks
            .iter()
            .filter(|t| t.holds_scope() && excluding != Some(t.id.as_str()))
            .map(|t| &t.scope)
            .collect()
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn create(&self, new_task: NewTask) -> Result<Task> {
        Validator::validate_new_task(&new_task)?;
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Task {
            id: new_task_id(),
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
        doc.tasks.push(task.clone());
        self.write(&doc).await?;
        Ok(task)
    }

    async fn create_from_template(&self, req: CreateFromTemplate) -> Result<Task> {
        let new_task = validation::instantiate_template(req)?;
        self.create(new_task).await
    }

    async fn get(&self, id: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let doc = self.read().await?;
        Self::find(&doc, id).cloned()
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let doc = self.read().await?;
        Ok(doc
            .tasks
            .iter()
            .filter(|t| filter.status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| filter.project.as_ref().map(|p| p == &t.project).unwrap_or(true))
            .filter(|t| {
                filter
                    .claimed_by
                    .as_ref()
                    .map(|c| t.claimed_by.as_deref() == Some(c.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn available(&self) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let doc = self.read().await?;
        let completed = Self::completed_ids(&doc);
        let held = Self::held_scopes(&doc, None);
        let mut result: Vec<Task> = doc
            .tasks
            .iter()
            .filter(|t| validation::is_available(t, &completed, &held))
            .cloned()
            .collect();
        result.sort_by_key(|t| validation::availability_sort_key(t));
        Ok(result)
    }

    async fn claim(&self, id: &str, agent: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;

        let completed = Self::completed_ids(&doc).into_iter().map(String::from).collect::<std::collections::HashSet<_>>();
        let held: Vec<howell_core::models::TaskScope> = doc
            .tasks
            .iter()
            .filter(|t| t.holds_scope() && t.id != id)
            .map(|t| t.scope.clone())
            .collect();
        let held_refs: Vec<&howell_core::models::TaskScope> = held.iter().collect();
        let completed_refs: std::collections::HashSet<&str> = completed.iter().map(String::as_str).collect();

        let task = Self::find(&doc, id)?;
        if !validation::is_available(task, &completed_refs, &held_refs) {
            if task.status != TaskStatus::Pending {
                return Err(HowellError::conflict(format!("task '{id}' is not pending")));
            }
            return Err(HowellError::conflict(format!(
                "task '{id}' is blocked by unmet dependencies or an overlapping claimed scope"
            )));
        }

        let task = Self::find_mut(&mut doc, id)?;
        task.status = TaskStatus::Claimed;
        task.claimed_by = Some(agent.to_string());
        task.claimed_at = Some(Utc::now());
        let result = task.clone();
        self.write(&doc).await?;
        Ok(result)
    }

    async fn start(&self, id: &str, agent: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        if task.status != TaskStatus::Claimed {
            return Err(HowellError::conflict(format!("task '{id}' is not claimed")));
        }
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is claimed by another agent"
            )));
        }
        task.status = TaskStatus::InProgress;
        task.started_at = Some(Utc::now());
        let result = task.clone();
        self.write(&doc).await?;
        Ok(result)
    }

    async fn add_progress_note(&self, id: &str, agent: &str, text: String) -> Result<ProgressNote> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is not claimed by this agent"
            )));
        }
        let note = ProgressNote {
            timestamp: Utc::now(),
            text,
        };
        task.progress_notes.push(note.clone());
        self.write(&doc).await?;
        Ok(note)
    }

    async fn complete(&self, id: &str, agent: &str, result: String, artifacts: Vec<String>) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        if !matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is not claimed or in progress"
            )));
        }
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is claimed by another agent"
            )));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(result);
        task.artifacts = artifacts;
        let updated = task.clone();
        self.write(&doc).await?;
        Ok(updated)
    }

    async fn fail_and_requeue(&self, id: &str, agent: &str, reason: String) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        if !matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is not claimed or in progress"
            )));
        }
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is claimed by another agent"
            )));
        }
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: format!("failed: {reason}"),
        });
        task.status = TaskStatus::Pending;
        task.claimed_by = None;
        task.claimed_at = None;
        task.started_at = None;
        let updated = task.clone();
        self.write(&doc).await?;
        Ok(updated)
    }

    async fn fail_terminal(&self, id: &str, reason: String) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: format!("failed (terminal): {reason}"),
        });
        task.status = TaskStatus::Failed;
        task.claimed_by = None;
        task.claimed_at = None;
        let updated = task.clone();
        self.write(&doc).await?;
        Ok(updated)
    }

    async fn release(&self, id: &str, agent: &str) -> Result<Task> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find_mut(&mut doc, id)?;
        if task.claimed_by.as_deref() != Some(agent) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is claimed by another agent"
            )));
        }
        task.progress_notes.push(ProgressNote {
            timestamp: Utc::now(),
            text: "released by claimer".to_string(),
        });
        task.status = TaskStatus::Pending;
        task.claimed_by = None;
        task.claimed_at = None;
        task.started_at = None;
        let updated = task.clone();
        self.write(&doc).await?;
        Ok(updated)
    }

    async fn release_all_for(&self, agent: &str) -> Result<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let mut released = Vec::new();
        for task in doc.tasks.iter_mut() {
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
        if !released.is_empty() {
            self.write(&doc).await?;
        }
        Ok(released)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let task = Self::find(&doc, id)?;
        if matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
            return Err(HowellError::conflict(format!(
                "task '{id}' is active and cannot be deleted"
            )));
        }
        let before = doc.tasks.len();
        doc.tasks.retain(|t| t.id != id);
        if doc.tasks.len() == before {
            return Err(HowellError::not_found(format!("task '{id}'")));
        }
        self.write(&doc).await
    }

    async fn templates(&self) -> Result<Vec<TaskTemplate>> {
        Ok(validation::template_catalog())
    }

    async fn stats(&self) -> Result<std::collections::HashMap<String, u64>> {
        let _guard = self.lock.lock().await;
        let doc = self.read().await?;
        let mut by_status = std::collections::HashMap::new();
        for task in &doc.tasks {
            *by_status.entry(task.status.to_string()).or_insert(0u64) += 1;
        }
        by_status.insert("total".to_string(), doc.tasks.len() as u64);
        Ok(by_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use howell_core::models::{TaskPriority, TaskScope};

    fn store(dir: &tempfile::TempDir) -> JsonTaskStore {
        JsonTaskStore::new(dir.path().join("tasks.json"))
    }

    fn new_task(title: &str, scope: TaskScope) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: "d".to_string(),
            project: "p".to_string(),
            scope,
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            created_by: "tester".to_string(),
        }
    }

    fn tag_scope(tags: &[&str]) -> TaskScope {
        TaskScope {
            files: Vec::new(),
            directories: Vec::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn scenario_s1_scope_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let a = store.create(new_task("A", tag_scope(&["ui"]))).await.unwrap();
        let b = store.create(new_task("B", tag_scope(&["ui", "copy"]))).await.unwrap();

        store.claim(&a.id, "X").await.unwrap();

        let available = store.available().await.unwrap();
        assert!(!available.iter().any(|t| t.id == b.id));

        let err = store.claim(&b.id, "Y").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn scenario_s2_dependency_gate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let a = store.create(new_task("A", TaskScope::default())).await.unwrap();
        let mut new_b = new_task("B", TaskScope::default());
        new_b.dependencies = vec![a.id.clone()];
        let b = store.create(new_b).await.unwrap();

        let available = store.available().await.unwrap();
        assert!(!available.iter().any(|t| t.id == b.id));

        store.claim(&a.id, "X").await.unwrap();
        store.complete(&a.id, "X", "done".to_string(), vec![]).await.unwrap();

        let available = store.available().await.unwrap();
        assert!(available.iter().any(|t| t.id == b.id));
    }

    #[tokio::test]
    async fn scenario_s3_auto_release_on_deregister() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let a = store.create(new_task("A", TaskScope::default())).await.unwrap();
        store.claim(&a.id, "X").await.unwrap();
        store.start(&a.id, "X").await.unwrap();
        store.add_progress_note(&a.id, "X", "halfway".to_string()).await.unwrap();

        let released = store.release_all_for("X").await.unwrap();
        assert_eq!(released.len(), 1);
        let task = store.get(&a.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.claimed_by.is_none());
        assert_eq!(task.progress_notes.len(), 2);
        assert_eq!(task.progress_notes[0].text, "halfway");
        assert!(task.progress_notes[1].text.contains("auto-released"));
    }

    #[tokio::test]
    async fn priority_ordering_in_availability() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut low = new_task("low", TaskScope::default());
        low.priority = TaskPriority::Low;
        let mut critical = new_task("critical", TaskScope::default());
        critical.priority = TaskPriority::Critical;
        store.create(low).await.unwrap();
        store.create(critical.clone()).await.unwrap();

        let available = store.available().await.unwrap();
        assert_eq!(available[0].priority, TaskPriority::Critical);
    }

    #[tokio::test]
    async fn delete_refuses_active_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let a = store.create(new_task("A", TaskScope::default())).await.unwrap();
        store.claim(&a.id, "X").await.unwrap();
        let err = store.delete(&a.id).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn delete_then_create_restores_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let before = store.list(TaskFilter::default()).await.unwrap().len();
        let a = store.create(new_task("A", TaskScope::default())).await.unwrap();
        store.delete(&a.id).await.unwrap();
        let after = store.list(TaskFilter::default()).await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn only_claimer_may_start_or_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let a = store.create(new_task("A", TaskScope::default())).await.unwrap();
        store.claim(&a.id, "X").await.unwrap();
        let err = store.start(&a.id, "Y").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn create_from_template_prefixes_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = store
            .create_from_template(CreateFromTemplate {
                template_name: "bug".to_string(),
                title: "crash".to_string(),
                description: None,
                project: "web".to_string(),
                extra_tags: Vec::new(),
                extra_scope: TaskScope::default(),
                created_by: "agent-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(task.title, "[BUG] crash");
    }
}
