use serde::{Deserialize, Serialize};

use crate::error::{HowellError, Result};

/// The daemon's configuration document (spec.md §6). Layered at load
/// time by `howelld`'s loader: built-in defaults, then an optional TOML
/// file, then `HOWELL_`-prefixed environment variables, then explicit
/// CLI flags override everything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root directory under which every store keeps its files
    /// (`bridge/` in the original; overridable by `HOWELL_PERSIST_ROOT`).
    pub persist_root: String,
    pub daemon_host: String,
    pub daemon_port: u16,
    pub dashboard_file: String,
    pub graph_file: String,
    /// Shared secret gating the authenticated route set (§6, §D).
    pub shared_secret: Option<String>,
    /// HMAC secret for GitHub webhook signature verification.
    pub webhook_secret: Option<String>,
    pub comfyui_url: Option<String>,
    pub mcp_memory_file: String,
    pub max_recent_sessions: usize,
    pub heartbeat_interval_hours: u64,
    pub watcher_interval_seconds: u64,
    pub queue_interval_seconds: u64,
    pub moltbook_interval_seconds: u64,
    /// Directories the filesystem watcher worker polls; overridable by
    /// `HOWELL_WATCH_DIRS` (colon-separated).
    #[serde(default)]
    pub watch_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            persist_root: "bridge".to_string(),
            daemon_host: "127.0.0.1".to_string(),
            daemon_port: 7777,
            dashboard_file: "dashboard.html".to_string(),
            graph_file: "knowledge_graph.json".to_string(),
            shared_secret: None,
            webhook_secret: None,
            comfyui_url: None,
            mcp_memory_file: "mcp_memory.json".to_string(),
            max_recent_sessions: 5,
            heartbeat_interval_hours: 1,
            watcher_interval_seconds: 30,
            queue_interval_seconds: 15,
            moltbook_interval_seconds: 300,
            watch_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Rejects values that would make the daemon unable to start.
    pub fn validate(&self) -> Result<()> {
        if self.persist_root.trim().is_empty() {
            return Err(HowellError::invalid_argument("persist_root cannot be empty"));
        }
        if self.daemon_port == 0 {
            return Err(HowellError::invalid_argument("daemon_port cannot be 0"));
        }
        if self.max_recent_sessions == 0 {
            return Err(HowellError::invalid_argument(
                "max_recent_sessions must be at least 1",
            ));
        }
        if self.heartbeat_interval_hours == 0 {
            return Err(HowellError::invalid_argument(
                "heartbeat_interval_hours must be at least 1",
            ));
        }
        if self.watcher_interval_seconds == 0 {
            return Err(HowellError::invalid_argument(
                "watcher_interval_seconds must be at least 1",
            ));
        }
        if self.queue_interval_seconds == 0 {
            return Err(HowellError::invalid_argument(
                "queue_interval_seconds must be at least 1",
            ));
        }
        if self.moltbook_interval_seconds == 0 {
            return Err(HowellError::invalid_argument(
                "moltbook_interval_seconds must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.daemon_host, self.daemon_port)
    }

    /// Whether the shared secret is configured; an unset secret means
    /// the authenticated route set runs open (local dev mode).
    pub fn auth_enabled(&self) -> bool {
        self.shared_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_port_rejected() {
        let mut cfg = Config::default();
        cfg.daemon_port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:7777");
    }

    #[test]
    fn auth_enabled_reflects_secret() {
        let mut cfg = Config::default();
        assert!(!cfg.auth_enabled());
        cfg.shared_secret = Some("x".to_string());
        assert!(cfg.auth_enabled());
    }
}
