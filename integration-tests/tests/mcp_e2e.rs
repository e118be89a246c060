//! S6 (spec.md §8): a real Streamable HTTP round trip against a daemon
//! bound to an ephemeral port, not just the in-process dispatcher unit
//! test in `mcp-protocol`.

use howell_core::Config;
use serde_json::{json, Value};

struct RunningDaemon {
    base_url: String,
    _dir: tempfile::TempDir,
    join: tokio::task::JoinHandle<()>,
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn spawn() -> RunningDaemon {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.persist_root = dir.path().to_string_lossy().to_string();
    let daemon = mcp_server::build_daemon(config).await.expect("build_daemon");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local_addr");
    let join = tokio::spawn(async move {
        axum::serve(listener, daemon.router).await.ok();
    });

    // give the listener a moment to start accepting.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    RunningDaemon { base_url: format!("http://{addr}"), _dir: dir, join }
}

#[tokio::test]
async fn s6_tools_call_round_trip_streamable_http() {
    let daemon = spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/mcp", daemon.base_url))
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "howell_add_entity",
                "arguments": {"name": "X", "entity_type": "T"},
            },
        }))
        .send()
        .await
        .expect("POST /mcp");

    assert!(response.headers().contains_key("mcp-session-id"), "Mcp-Session-Id header must be present");

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["result"]["isError"], json!(false));

    let text = body["result"]["content"][0]["text"].as_str().expect("text content");
    let parsed: Value = serde_json::from_str(text).expect("inner JSON");
    assert_eq!(parsed["result"], json!("Created entity 'X' (T) with 0 observations"));
}

#[tokio::test]
async fn notification_only_batch_yields_202_with_no_body() {
    let daemon = spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/mcp", daemon.base_url))
        .json(&json!({"jsonrpc": "2.0", "method": "tools/list"}))
        .send()
        .await
        .expect("POST /mcp");

    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body = response.bytes().await.expect("body bytes");
    assert!(body.is_empty());
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let daemon = spawn().await;
    let response = reqwest::get(format!("{}/health", daemon.base_url)).await.expect("GET /health");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
