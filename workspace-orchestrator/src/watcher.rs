//! Filesystem watcher worker (spec.md §4.7): every ~30s, scans the
//! configured watch directories, diffs an mtime snapshot, and appends
//! add/modify/delete events to an in-memory ring and an on-disk log.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsChangeEvent {
    pub path: String,
    pub kind: FsChangeKind,
    pub detected_at: DateTime<Utc>,
}

/// An mtime snapshot keyed by path, used to diff against the previous
/// scan.
pub type Snapshot = HashMap<String, SystemTime>;

/// Walks every file under `dirs` one level deep per directory (the
/// source's watcher is non-recursive by design: it watches a flat set
/// of project directories, not an arbitrary tree) and returns the
/// current mtime snapshot.
pub fn scan(dirs: &[String]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir, error = %e, "watch directory unreadable, skipping");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    if let Ok(mtime) = metadata.modified() {
                        snapshot.insert(path_key(&path), mtime);
                    }
                }
            }
        }
    }
    snapshot
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Diffs `previous` against `current`, yielding one event per add,
/// modify, or delete.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<FsChangeEvent> {
    let now = Utc::now();
    let mut events = Vec::new();

    for (path, mtime) in current {
        match previous.get(path) {
            None => events.push(FsChangeEvent { path: path.clone(), kind: FsChangeKind::Added, detected_at: now }),
            Some(prev_mtime) if prev_mtime != mtime => {
                events.push(FsChangeEvent { path: path.clone(), kind: FsChangeKind::Modified, detected_at: now })
            }
            _ => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push(FsChangeEvent { path: path.clone(), kind: FsChangeKind::Removed, detected_at: now });
        }
    }
    events
}

/// Appends `events` as newline-delimited JSON to the on-disk watcher
/// log; best-effort, a write failure is logged and otherwise ignored
/// (this log is a diagnostic aid, not a store of record).
pub async fn append_log(log_path: &Path, events: &[FsChangeEvent]) {
    if events.is_empty() {
        return;
    }
    let mut body = String::new();
    for event in events {
        if let Ok(line) = serde_json::to_string(event) {
            body.push_str(&line);
            body.push('\n');
        }
    }
    if let Some(parent) = log_path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    use tokio::io::AsyncWriteExt;
    match tokio::fs::OpenOptions::new().create(true).append(true).open(log_path).await {
        Ok(mut file) => {
            if let Err(e) = file.write_all(body.as_bytes()).await {
                tracing::warn!(path = %log_path.display(), error = %e, "failed to append watcher log");
            }
        }
        Err(e) => tracing::warn!(path = %log_path.display(), error = %e, "failed to open watcher log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn diff_detects_added_modified_removed() {
        let mut previous = Snapshot::new();
        previous.insert("a".to_string(), SystemTime::UNIX_EPOCH);
        previous.insert("b".to_string(), SystemTime::UNIX_EPOCH);

        let mut current = Snapshot::new();
        current.insert("a".to_string(), SystemTime::UNIX_EPOCH);
        current.insert("c".to_string(), SystemTime::UNIX_EPOCH);

        let events = diff(&previous, &current);
        let kinds: Vec<_> = events.iter().map(|e| (e.path.clone(), e.kind)).collect();
        assert!(kinds.contains(&("c".to_string(), FsChangeKind::Added)));
        assert!(kinds.contains(&("b".to_string(), FsChangeKind::Removed)));
        assert!(!kinds.iter().any(|(p, _)| p == "a"));
    }

    #[test]
    fn scan_reads_file_mtimes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), b"hi").unwrap();
        let snapshot = scan(&[dir.path().to_string_lossy().to_string()]);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn scan_skips_unreadable_dirs_without_panicking() {
        let snapshot = scan(&["/nonexistent/path/xyz".to_string()]);
        assert!(snapshot.is_empty());
    }
}
