//! JSON-RPC 2.0 envelope types shared by both transports (spec.md §4.6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absence of `id` marks this a *notification*: callers expect no
    /// response object at all.
    #[serde(default)]
    pub id: Option<Value>,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A single request, or a batch of requests (spec.md §4.6 Streamable
/// HTTP: "carries a request object or a batch array").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcInbound {
    Single(JsonRpcRequest),
    Batch(Vec<JsonRpcRequest>),
}

impl JsonRpcInbound {
    pub fn requests(self) -> Vec<JsonRpcRequest> {
        match self {
            JsonRpcInbound::Single(r) => vec![r],
            JsonRpcInbound::Batch(rs) => rs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A single response, or a batch of responses, matching the shape of
/// the inbound request (spec.md §4.6).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcOutbound {
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
    /// All-notification batches get no body (202 Accepted is the HTTP
    /// signal instead).
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_id_is_notification() {
        let req: JsonRpcRequest = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "tools/list",
        }))
        .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn batch_inbound_parses_array() {
        let inbound: JsonRpcInbound = serde_json::from_value(serde_json::json!([
            {"jsonrpc": "2.0", "method": "a", "id": 1},
            {"jsonrpc": "2.0", "method": "b", "id": 2},
        ]))
        .unwrap();
        assert_eq!(inbound.requests().len(), 2);
    }
}
