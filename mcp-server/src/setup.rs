//! Wires concrete store implementations into a [`Coordinator`], builds
//! the merged HTTP surface (REST + tool-RPC + webhook), and starts the
//! watchdog-supervised background workers.

use std::path::Path;
use std::sync::Arc;

use axum::{middleware, Router};
use howell_core::{Config, Coordinator};
use howell_store::{InMemoryInstanceRegistry, JsonKnowledgeGraphStore, JsonSessionLog, JsonTaskStore, SqliteStratigraphyStore};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::auth;
use crate::http::{self, AppState};
use crate::workers;

/// Reads a secret from `path` if present, otherwise generates a fresh
/// one (two concatenated v4 UUIDs, hyphens stripped) and persists it.
/// Per spec.md §4.5/§6: the shared secret and the webhook secret are
/// each generated once on first start and kept in a small plaintext
/// file under the bridge root, so restarts reuse the same value.
async fn load_or_generate_secret(path: &Path) -> anyhow::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                Err(anyhow::anyhow!("secret file {} is empty", path.display()))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => {
            let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
            tokio::fs::write(path, &secret).await?;
            Ok(secret)
        }
    }
}

/// Everything a running daemon needs to serve requests and shut down
/// cleanly: the bound router and the background workers' join handles.
pub struct Daemon {
    pub router: Router,
    pub coordinator: Arc<Coordinator>,
    pub worker_joins: Vec<JoinHandle<()>>,
}

/// Builds a [`Coordinator`] from `config`, creating `persist_root` and
/// its subdirectories if they don't exist yet.
pub async fn build_coordinator(config: Config) -> anyhow::Result<Arc<Coordinator>> {
    let root = Path::new(&config.persist_root);
    for sub in ["memory", "inbox", "queue/comfyui", "queue/moltbook"] {
        tokio::fs::create_dir_all(root.join(sub)).await?;
    }

    let mut config = config;
    if config.shared_secret.is_none() {
        config.shared_secret = Some(load_or_generate_secret(&root.join(".api_key")).await?);
    }
    if config.webhook_secret.is_none() {
        config.webhook_secret = Some(load_or_generate_secret(&root.join(".webhook_secret")).await?);
    }

    let graph = Arc::new(JsonKnowledgeGraphStore::new(root.join(&config.graph_file)));
    let tasks = Arc::new(JsonTaskStore::new(root.join("tasks.json")));
    let stratigraphy_path = root.join("stratigraphy.db");
    let stratigraphy = Arc::new(SqliteStratigraphyStore::connect(stratigraphy_path.to_string_lossy().as_ref()).await?);
    let instances = Arc::new(InMemoryInstanceRegistry::new());
    let session_log = Arc::new(JsonSessionLog::new(root.join("sessions.json")));

    Ok(Arc::new(Coordinator::new(graph, tasks, stratigraphy, instances, session_log, config)))
}

/// Assembles the full daemon: coordinator, background workers, and the
/// merged axum router (REST surface, tool-RPC transport, auth gate,
/// permissive CORS per spec.md §6).
pub async fn build_daemon(config: Config) -> anyhow::Result<Daemon> {
    let coordinator = build_coordinator(config).await?;
    let (worker_handles, worker_joins) = workers::start(coordinator.clone());

    let state = AppState { coordinator: coordinator.clone(), workers: worker_handles };

    let rest = http::router(state);
    let tool_rpc = mcp_protocol::router(coordinator.clone());

    let router = Router::new()
        .merge(rest)
        .merge(tool_rpc)
        .layer(middleware::from_fn_with_state(coordinator.clone(), auth::require_shared_secret))
        .layer(CorsLayer::permissive());

    Ok(Daemon { router, coordinator, worker_joins })
}
