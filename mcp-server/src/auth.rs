//! Shared-secret gate for the REST surface (spec.md §4.5). Dashboard
//! pages, the explicitly-public read endpoints, the coordination
//! prefixes (`/instance*`, `/tasks*`, `/agents*`, `/handoffs*`), the
//! tool-RPC transport, and the webhook all skip this check — the
//! webhook carries its own HMAC gate in `webhook.rs`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use howell_core::Coordinator;
use std::sync::Arc;

const PUBLIC_PATHS: &[&str] = &[
    "/status",
    "/knowledge",
    "/pinned",
    "/recent",
    "/summary",
    "/search",
    "/health",
];

const COORDINATION_PREFIXES: &[&str] = &["/instance", "/tasks", "/agents", "/handoffs"];

fn is_public(path: &str) -> bool {
    if path.starts_with("/identity/") || path == "/mcp" || path.starts_with("/mcp/") || path.starts_with("/webhook/") {
        return true;
    }
    PUBLIC_PATHS.contains(&path) || COORDINATION_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn extract_key(req: &Request) -> Option<String> {
    if let Some(v) = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    if let Some(v) = req.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = v.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    req.uri().query().and_then(|q| {
        url_query_value(q, "key")
    })
}

fn url_query_value(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        let v = parts.next().unwrap_or("");
        (k == key).then(|| v.to_string())
    })
}

/// Axum middleware: 401s unless the path is public/coordination or a
/// valid shared secret is presented. Auth is a no-op when no secret is
/// configured (local dev mode, per `Config::auth_enabled`).
pub async fn require_shared_secret(
    State(coordinator): State<Arc<Coordinator>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    if !coordinator.config.auth_enabled() || is_public(&path) {
        return Ok(next.run(req).await);
    }

    let expected = coordinator.config.shared_secret.as_deref().unwrap_or_default();
    match extract_key(&req) {
        Some(ref key) if key == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_recognized() {
        assert!(is_public("/status"));
        assert!(is_public("/health"));
        assert!(is_public("/identity/soul"));
        assert!(is_public("/tasks"));
        assert!(is_public("/tasks/board"));
        assert!(is_public("/agents/CH-260101-1"));
        assert!(is_public("/mcp"));
        assert!(is_public("/webhook/github"));
    }

    #[test]
    fn private_paths_rejected() {
        assert!(!is_public("/changes"));
        assert!(!is_public("/inbox"));
        assert!(!is_public("/queue"));
        assert!(!is_public("/moltbook"));
        assert!(!is_public("/stats"));
        assert!(!is_public("/config"));
    }

    #[test]
    fn query_value_parses_key_param() {
        assert_eq!(url_query_value("key=abc&x=1", "key"), Some("abc".to_string()));
        assert_eq!(url_query_value("x=1", "key"), None);
    }
}
