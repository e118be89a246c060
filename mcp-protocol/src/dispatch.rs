//! Method dispatch shared by both transports (spec.md §4.6): `initialize`,
//! `tools/list`, `tools/call`. Unknown methods yield JSON-RPC code -32601.

use std::sync::Arc;

use howell_core::Coordinator;
use serde_json::{json, Value};

use crate::error::{error_result_body, to_json_rpc_error, METHOD_NOT_FOUND};
use howell_core::error::HowellError;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse};
use crate::tools::{call_tool, catalog};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "howell-coordination-daemon";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Execute one request against the shared coordinator state. Returns
/// `None` for notifications (no `id`): the caller sends no response
/// object for those (§4.6 "respond with 202 Accepted and no body").
pub async fn dispatch_one(coordinator: &Arc<Coordinator>, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = req.id.clone();
    let result = execute_method(coordinator, &req.method, req.params).await;

    let id = id?;
    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(rpc_error) => JsonRpcResponse::failure(id, rpc_error),
    })
}

/// Run `method` with `params`, returning either a JSON-RPC `result`
/// value or a ready-to-serialize JSON-RPC `error` object.
async fn execute_method(coordinator: &Arc<Coordinator>, method: &str, params: Value) -> Result<Value, Value> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })),
        "tools/list" => Ok(json!({ "tools": catalog() })),
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| to_json_rpc_error(&HowellError::invalid_argument("missing 'name'")))?;
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            let (body, is_error) = match call_tool(coordinator, name, arguments).await {
                Ok(value) => (json!({ "result": value }), false),
                Err(err) => (error_result_body(&err), true),
            };

            Ok(json!({
                "content": [{"type": "text", "text": body.to_string()}],
                "isError": is_error,
            }))
        }
        other => Err(json!({
            "code": METHOD_NOT_FOUND,
            "message": format!("unknown method '{other}'"),
        })),
    }
}
