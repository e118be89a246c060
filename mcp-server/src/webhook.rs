//! GitHub webhook handler (spec.md §6): HMAC-SHA256-gated, creates
//! tasks from the template catalog in response to `issues`,
//! `pull_request` and `push` events.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use hmac::{Hmac, Mac};
use howell_core::{
    models::{CreateFromTemplate, TaskScope},
    Coordinator,
};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::http::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `X-Hub-Signature-256` against the configured webhook
/// secret. Per spec.md §6: if both a signature and a secret are
/// present they must match; if no signature was sent but a secret is
/// configured the check is skipped (accepted for initial setup).
fn signature_ok(secret: Option<&str>, signature: Option<&str>, body: &[u8]) -> bool {
    let (secret, signature) = match (secret, signature) {
        (Some(secret), Some(signature)) => (secret, signature),
        (Some(_), None) => return true,
        (None, _) => return true,
    };

    let Some(hex_digest) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

async fn create_from_template(
    coordinator: &Coordinator,
    template_name: &str,
    title: String,
    extra_tags: Vec<String>,
) -> howell_core::error::Result<howell_core::models::Task> {
    coordinator
        .tasks
        .create_from_template(CreateFromTemplate {
            template_name: template_name.to_string(),
            title,
            description: None,
            project: String::new(),
            extra_tags,
            extra_scope: TaskScope::default(),
            created_by: "github-webhook".to_string(),
        })
        .await
}

fn issue_template(labels: &[Value]) -> &'static str {
    let names: Vec<&str> = labels.iter().filter_map(|l| l.get("name").and_then(Value::as_str)).collect();
    if names.iter().any(|n| n.eq_ignore_ascii_case("bug")) {
        "bug"
    } else if names.iter().any(|n| n.eq_ignore_ascii_case("refactor")) {
        "refactor"
    } else {
        "feature"
    }
}

/// `POST /webhook/github`.
pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let coordinator = state.coordinator;
    let signature = headers.get("X-Hub-Signature-256").and_then(|v| v.to_str().ok());
    if !signature_ok(coordinator.config.webhook_secret.as_deref(), signature, &body) {
        return Json(json!({"error": "Unauthorized: webhook signature mismatch"}));
    }

    let event = headers.get("X-GitHub-Event").and_then(|v| v.to_str().ok()).unwrap_or("");
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match event {
        "ping" => Json(json!({"ok": true, "message": "pong"})),
        "issues" if payload["action"] == "opened" => {
            let labels = payload["issue"]["labels"].as_array().cloned().unwrap_or_default();
            let template = issue_template(&labels);
            let title = payload["issue"]["title"].as_str().unwrap_or("untitled issue").to_string();
            match create_from_template(&coordinator, template, title, vec!["github".to_string()]).await {
                Ok(task) => Json(json!({"ok": true, "task_id": task.id})),
                Err(e) => Json(json!({"error": format!("{}: {}", e.kind(), e)})),
            }
        }
        "pull_request" if payload["action"] == "opened" => {
            let title = payload["pull_request"]["title"].as_str().unwrap_or("untitled PR").to_string();
            match create_from_template(&coordinator, "review", format!("Review: {title}"), vec!["github".to_string()]).await {
                Ok(task) => Json(json!({"ok": true, "task_id": task.id})),
                Err(e) => Json(json!({"error": format!("{}: {}", e.kind(), e)})),
            }
        }
        "push" => {
            let branch_ref = payload["ref"].as_str().unwrap_or("");
            let commits = payload["commits"].as_array().cloned().unwrap_or_default();
            if (branch_ref == "refs/heads/main" || branch_ref == "refs/heads/master") && !commits.is_empty() {
                let title = format!("Deploy {} commit(s) to {}", commits.len(), branch_ref);
                match create_from_template(&coordinator, "deploy", title, vec!["github".to_string()]).await {
                    Ok(task) => Json(json!({"ok": true, "task_id": task.id})),
                    Err(e) => Json(json!({"error": format!("{}: {}", e.kind(), e)})),
                }
            } else {
                Json(json!({"ok": true, "ignored": true}))
            }
        }
        other => Json(json!({"ok": true, "ignored": true, "event": other})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_secret_configured_skips_check() {
        assert!(signature_ok(None, None, b"body"));
        assert!(signature_ok(None, Some("sha256=bogus"), b"body"));
    }

    #[test]
    fn secret_configured_no_signature_is_accepted() {
        assert!(signature_ok(Some("secret"), None, b"body"));
    }

    #[test]
    fn valid_signature_matches() {
        let secret = "topsecret";
        let body = b"hello world";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let digest = hex::encode(mac.finalize().into_bytes());
        let header = format!("sha256={digest}");
        assert!(signature_ok(Some(secret), Some(&header), body));
    }

    #[test]
    fn invalid_signature_rejected() {
        assert!(!signature_ok(Some("secret"), Some("sha256=deadbeef"), b"body"));
    }

    #[test]
    fn issue_template_picks_bug_label() {
        let labels = vec![json!({"name": "bug"})];
        assert_eq!(issue_template(&labels), "bug");
    }

    #[test]
    fn issue_template_defaults_to_feature() {
        assert_eq!(issue_template(&[]), "feature");
    }
}
