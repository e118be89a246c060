//! Generation-queue executor (spec.md §4.7): every ~10s, picks the
//! next approved plan under `queue/comfyui/`, POSTs a workflow to the
//! external renderer, polls for completion within a deadline, and
//! records success with an output path or a timeout/failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use howell_core::error::HowellError;
use serde::{Deserialize, Serialize};

use crate::templates::{render_workflow, WorkflowContext};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Queued,
    Approved,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPlan {
    pub id: String,
    pub prompt: String,
    pub status: PlanStatus,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn queue_dir(persist_root: &str) -> PathBuf {
    Path::new(persist_root).join("queue").join("comfyui")
}

async fn list_plans(persist_root: &str) -> Vec<PathBuf> {
    let dir = queue_dir(persist_root);
    let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
        return Vec::new();
    };
    let mut paths = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    paths
}

async fn load_plan(path: &Path) -> Option<GenerationPlan> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// One executor tick: find the first `Approved` plan (lexically
/// smallest filename, since plans are named `NNN_YYYYMMDD_HHMMSS.json`),
/// submit it, poll for completion, persist the outcome. A no-op tick
/// (no approved plan) is not an error.
pub async fn run_once(persist_root: &str, renderer_url: Option<&str>, client: &reqwest::Client) -> anyhow::Result<()> {
    let paths = list_plans(persist_root).await;
    for path in paths {
        let Some(mut plan) = load_plan(&path).await else { continue };
        if plan.status != PlanStatus::Approved {
            continue;
        }

        plan.status = PlanStatus::Running;
        howell_store::atomic_file::write_atomic(&path, &plan).await.map_err(anyhow::Error::from)?;

        let Some(url) = renderer_url else {
            plan.status = PlanStatus::Failed;
            plan.error = Some("no renderer configured".to_string());
            howell_store::atomic_file::write_atomic(&path, &plan).await.map_err(anyhow::Error::from)?;
            return Ok(());
        };

        let body = render_workflow(&WorkflowContext { plan_id: &plan.id, prompt: &plan.prompt })?;
        let outcome = submit_and_poll(client, url, body).await;

        match outcome {
            Ok(output_path) => {
                plan.status = PlanStatus::Completed;
                plan.output_path = Some(output_path);
            }
            Err(e) => {
                plan.status = PlanStatus::Failed;
                plan.error = Some(e.to_string());
            }
        }
        howell_store::atomic_file::write_atomic(&path, &plan).await.map_err(anyhow::Error::from)?;
        return Ok(());
    }
    Ok(())
}

async fn submit_and_poll(client: &reqwest::Client, url: &str, body: String) -> Result<String, HowellError> {
    let response = tokio::time::timeout(SUBMIT_TIMEOUT, client.post(url).body(body).send())
        .await
        .map_err(|_| HowellError::transport("renderer submit timed out"))?
        .map_err(|e| HowellError::transport(format!("renderer submit failed: {e}")))?;

    if !response.status().is_success() {
        return Err(HowellError::transport(format!("renderer returned {}", response.status())));
    }

    let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
    loop {
        let status_url = format!("{url}/status");
        if let Ok(Ok(poll)) = tokio::time::timeout(Duration::from_secs(5), client.get(&status_url).send()).await {
            if poll.status().is_success() {
                if let Ok(body) = poll.json::<serde_json::Value>().await {
                    if let Some(output) = body.get("output_path").and_then(|v| v.as_str()) {
                        return Ok(output.to_string());
                    }
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(HowellError::transport("renderer completion deadline exceeded"));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_plans_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let result = run_once(dir.path().to_str().unwrap(), None, &client).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn approved_plan_without_renderer_fails_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_dir(dir.path().to_str().unwrap());
        tokio::fs::create_dir_all(&queue).await.unwrap();
        let plan = GenerationPlan {
            id: "001".to_string(),
            prompt: "a cat".to_string(),
            status: PlanStatus::Approved,
            output_path: None,
            error: None,
            created_at: Utc::now(),
        };
        let path = queue.join("001_20260101_000000.json");
        tokio::fs::write(&path, serde_json::to_vec(&plan).unwrap()).await.unwrap();

        let client = reqwest::Client::new();
        run_once(dir.path().to_str().unwrap(), None, &client).await.unwrap();

        let updated: GenerationPlan = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(updated.status, PlanStatus::Failed);
        assert!(updated.error.is_some());
    }

    #[tokio::test]
    async fn queued_plan_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_dir(dir.path().to_str().unwrap());
        tokio::fs::create_dir_all(&queue).await.unwrap();
        let plan = GenerationPlan {
            id: "002".to_string(),
            prompt: "a dog".to_string(),
            status: PlanStatus::Queued,
            output_path: None,
            error: None,
            created_at: Utc::now(),
        };
        let path = queue.join("002_20260101_000000.json");
        tokio::fs::write(&path, serde_json::to_vec(&plan).unwrap()).await.unwrap();

        let client = reqwest::Client::new();
        run_once(dir.path().to_str().unwrap(), None, &client).await.unwrap();

        let untouched: GenerationPlan = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(untouched.status, PlanStatus::Queued);
    }
}
