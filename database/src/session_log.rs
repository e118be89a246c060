use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use howell_core::{error::Result, models::SessionLogEntry, repository::SessionLog};

use crate::atomic_file::{ensure_parent_dir, load_with_fallback, write_atomic};

/// Number of on-disk entries retained; SPEC_FULL.md §C resolves
/// spec.md §3's "bounded tail" to this concrete value, matching the
/// original bridge daemon's session log cap.
const TAIL_CAP: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    entries: Vec<SessionLogEntry>,
}

/// Append-only, capped JSON session log (spec.md §3, §6
/// `bridge/sessions.json`).
pub struct JsonSessionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SessionLog for JsonSessionLog {
    async fn append(&self, action: String, details: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc: Document = load_with_fallback(&self.path).await?;
        doc.entries.push(SessionLogEntry {
            timestamp: Utc::now(),
            action,
            details,
        });
        if doc.entries.len() > TAIL_CAP {
            let overflow = doc.entries.len() - TAIL_CAP;
            doc.entries.drain(0..overflow);
        }
        ensure_parent_dir(&self.path).await?;
        write_atomic(&self.path, &doc).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SessionLogEntry>> {
        let _guard = self.lock.lock().await;
        let doc: Document = load_with_fallback(&self.path).await?;
        let start = doc.entries.len().saturating_sub(limit);
        Ok(doc.entries[start..].to_vec())
    }
}
