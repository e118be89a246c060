use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use howell_core::error::{HowellError, Result};

/// Shared atomic-write discipline for every JSON-file-backed store
/// (spec.md §4.2, §4.1, §6): write to a sibling `.tmp` file, copy the
/// current primary to `.bak` (one rolling generation), then rename the
/// temp file over the primary. A reader never observes a partial write.
pub async fn write_atomic<T: Serialize>(primary: &Path, value: &T) -> Result<()> {
    let tmp = tmp_path(primary);
    let bak = bak_path(primary);

    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| HowellError::internal(format!("serialize failed: {e}")))?;

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| HowellError::internal(format!("write temp file failed: {e}")))?;

    if tokio::fs::try_exists(primary).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::copy(primary, &bak).await {
            tracing::warn!(path = %primary.display(), error = %e, "failed to roll backup file");
        }
    }

    tokio::fs::rename(&tmp, primary)
        .await
        .map_err(|e| HowellError::internal(format!("rename temp file failed: {e}")))?;

    Ok(())
}

/// Loads the primary document, falling back to the rolling backup if
/// the primary is missing or unparseable. If both are unreadable, the
/// primary (if present) is moved aside to `<primary>.corrupt.<ts>` and
/// `default` is returned with a logged warning — this store never
/// crashes the daemon on a corrupt file (spec.md §7 `CorruptStore`).
pub async fn load_with_fallback<T: DeserializeOwned + Default>(primary: &Path) -> Result<T> {
    if let Some(value) = try_read(primary).await {
        return Ok(value);
    }

    let bak = bak_path(primary);
    if let Some(value) = try_read(&bak).await {
        tracing::warn!(path = %primary.display(), "primary store corrupt, recovered from backup");
        return Ok(value);
    }

    if tokio::fs::try_exists(primary).await.unwrap_or(false) {
        let corrupt = corrupt_path(primary);
        if let Err(e) = tokio::fs::rename(primary, &corrupt).await {
            tracing::warn!(path = %primary.display(), error = %e, "failed to move aside corrupt store");
        } else {
            tracing::warn!(path = %corrupt.display(), "primary and backup both corrupt, moved aside");
        }
    }

    Ok(T::default())
}

async fn try_read<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn tmp_path(primary: &Path) -> PathBuf {
    append_ext(primary, "tmp")
}

fn bak_path(primary: &Path) -> PathBuf {
    append_ext(primary, "bak")
}

fn corrupt_path(primary: &Path) -> PathBuf {
    append_ext(primary, &format!("corrupt.{}", now_stamp()))
}

fn now_stamp() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    since_epoch.as_secs().to_string()
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HowellError::internal(format!("create directory failed: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
    struct Doc {
        value: u32,
    }

    #[tokio::test]
    async fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, &Doc { value: 7 }).await.unwrap();
        let loaded: Doc = load_with_fallback(&path).await.unwrap();
        assert_eq!(loaded, Doc { value: 7 });
    }

    #[tokio::test]
    async fn second_write_rolls_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, &Doc { value: 1 }).await.unwrap();
        write_atomic(&path, &Doc { value: 2 }).await.unwrap();
        let bak: Doc = try_read(&bak_path(&path)).await.unwrap();
        assert_eq!(bak, Doc { value: 1 });
    }

    #[tokio::test]
    async fn corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, &Doc { value: 1 }).await.unwrap();
        write_atomic(&path, &Doc { value: 2 }).await.unwrap();
        tokio::fs::write(&path, b"not json").await.unwrap();
        let loaded: Doc = load_with_fallback(&path).await.unwrap();
        assert_eq!(loaded, Doc { value: 1 });
    }

    #[tokio::test]
    async fn both_corrupt_yields_default_and_moves_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        tokio::fs::write(&bak_path(&path), b"also not json").await.unwrap();
        let loaded: Doc = load_with_fallback(&path).await.unwrap();
        assert_eq!(loaded, Doc::default());
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn missing_primary_and_backup_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let loaded: Doc = load_with_fallback(&path).await.unwrap();
        assert_eq!(loaded, Doc::default());
    }
}
