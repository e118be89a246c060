//! Post scheduler worker (spec.md §4.7): every ~60s, picks due
//! scheduled posts under `queue/moltbook/` and POSTs them to the
//! external social endpoint with an injected honest timestamp footer.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::templates::render_post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    #[serde(default)]
    pub error: Option<String>,
}

fn queue_dir(persist_root: &str) -> PathBuf {
    Path::new(persist_root).join("queue").join("moltbook")
}

async fn list_posts(persist_root: &str) -> Vec<PathBuf> {
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

/// One scheduler tick: POSTs every due, still-`Scheduled` post to the
/// configured social endpoint.
pub async fn run_once(persist_root: &str, social_url: Option<&str>, client: &reqwest::Client) -> anyhow::Result<()> {
    let now = Utc::now();
    for path in list_posts(persist_root).await {
        let Ok(bytes) = tokio::fs::read(&path).await else { continue };
        let Ok(mut post): Result<ScheduledPost, _> = serde_json::from_slice(&bytes) else { continue };
        if post.status != PostStatus::Scheduled || post.scheduled_at > now {
            continue;
        }

        let body = render_post(&post.content)?;
        match social_url {
            Some(url) => match client.post(url).body(body).send().await {
                Ok(resp) if resp.status().is_success() => post.status = PostStatus::Sent,
                Ok(resp) => {
                    post.status = PostStatus::Failed;
                    post.error = Some(format!("social endpoint returned {}", resp.status()));
                }
                Err(e) => {
                    post.status = PostStatus::Failed;
                    post.error = Some(e.to_string());
                }
            },
            None => {
                post.status = PostStatus::Failed;
                post.error = Some("no social endpoint configured".to_string());
            }
        }
        howell_store::atomic_file::write_atomic(&path, &post).await.map_err(anyhow::Error::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn future_post_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_dir(dir.path().to_str().unwrap());
        tokio::fs::create_dir_all(&queue).await.unwrap();
        let post = ScheduledPost {
            id: "1".to_string(),
            content: "hi".to_string(),
            scheduled_at: Utc::now() + ChronoDuration::hours(1),
            status: PostStatus::Scheduled,
            error: None,
        };
        let path = queue.join("001.json");
        tokio::fs::write(&path, serde_json::to_vec(&post).unwrap()).await.unwrap();

        let client = reqwest::Client::new();
        run_once(dir.path().to_str().unwrap(), None, &client).await.unwrap();

        let untouched: ScheduledPost = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(untouched.status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn due_post_without_endpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_dir(dir.path().to_str().unwrap());
        tokio::fs::create_dir_all(&queue).await.unwrap();
        let post = ScheduledPost {
            id: "2".to_string(),
            content: "hi".to_string(),
            scheduled_at: Utc::now() - ChronoDuration::minutes(1),
            status: PostStatus::Scheduled,
            error: None,
        };
        let path = queue.join("002.json");
        tokio::fs::write(&path, serde_json::to_vec(&post).unwrap()).await.unwrap();

        let client = reqwest::Client::new();
        run_once(dir.path().to_str().unwrap(), None, &client).await.unwrap();

        let updated: ScheduledPost = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(updated.status, PostStatus::Failed);
    }
}
