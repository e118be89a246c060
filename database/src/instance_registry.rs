use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use howell_core::{
    error::{HowellError, Result},
    models::{FileConflict, Instance},
    repository::InstanceRegistry,
};

const DEFAULT_EXPIRY: Duration = Duration::from_secs(600);

/// Volatile, in-memory instance registry (spec.md §4.4). No
/// persistence; expiry is lazy — every operation purges rows whose
/// last heartbeat is older than the configured threshold before doing
/// its own work, so no background reaper is required.
pub struct InMemoryInstanceRegistry {
    instances: Mutex<HashMap<String, Instance>>,
    expiry: Duration,
}

impl InMemoryInstanceRegistry {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            expiry: DEFAULT_EXPIRY,
        }
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    fn purge_expired(instances: &mut HashMap<String, Instance>, expiry: Duration) {
        let now = Utc::now();
        instances.retain(|_, instance| {
            let idle = now.signed_duration_since(instance.last_heartbeat);
            idle.to_std().map(|d| d < expiry).unwrap_or(true)
        });
    }

    fn new_id() -> String {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut seed = nanos ^ counter.wrapping_mul(0x9E3779B97F4A7C15);
        let mut bytes = [0u8; 4];
        for b in bytes.iter_mut() {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            *b = (seed & 0xff) as u8;
        }
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Default for InMemoryInstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceRegistry for InMemoryInstanceRegistry {
    async fn register(&self, workspace: String, platform: String, activity: String) -> Result<Instance> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        let now = Utc::now();
        let instance = Instance {
            id: Self::new_id(),
            workspace,
            platform,
            status: "active".to_string(),
            activity,
            active_files: Vec::new(),
            registered_at: now,
            last_heartbeat: now,
            heartbeat_count: 0,
        };
        instances.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn heartbeat(&self, id: &str, activity: Option<String>, active_files: Option<Vec<String>>) -> Result<Instance> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        instance.last_heartbeat = Utc::now();
        instance.heartbeat_count += 1;
        if let Some(activity) = activity {
            instance.activity = activity;
        }
        if let Some(files) = active_files {
            instance.active_files = files;
        }
        Ok(instance.clone())
    }

    async fn update_status(&self, id: &str, status: String) -> Result<Instance> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        instance.status = status;
        Ok(instance.clone())
    }

    async fn deregister(&self, id: &str) -> Result<()> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        instances
            .remove(id)
            .ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Instance> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        instances
            .get(id)
            .cloned()
            .ok_or_else(|| HowellError::not_found(format!("instance '{id}'")))
    }

    async fn list(&self, workspace: Option<&str>) -> Result<Vec<Instance>> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
        Ok(instances
            .values()
            .filter(|i| workspace.map(|w| w == i.workspace).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn check_conflicts(&self, id: &str, files: &[String]) -> Result<Vec<FileConflict>> {
        let mut instances = self.instances.lock().await;
        Self::purge_expired(&mut instances, self.expiry);
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
