//! Maps the coordination engine's error taxonomy ([`howell_core::error::HowellError`])
//! onto JSON-RPC 2.0 error objects (spec.md §4.6, §7).

use howell_core::error::HowellError;
use serde_json::{json, Value};

/// Standard JSON-RPC "Method not found" code (spec.md §4.6).
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Standard JSON-RPC "Invalid params" code.
pub const INVALID_PARAMS: i64 = -32602;
/// Standard JSON-RPC "Internal error" code.
pub const INTERNAL_ERROR: i64 = -32603;
/// Standard JSON-RPC "Parse error" code.
pub const PARSE_ERROR: i64 = -32700;
/// Standard JSON-RPC "Invalid Request" code.
pub const INVALID_REQUEST: i64 = -32600;

/// Server-defined error codes for the coordination taxonomy, chosen
/// from the reserved `-32000..-32099` server-error range.
fn code_for(err: &HowellError) -> i64 {
    match err {
        HowellError::NotFound(_) => -32001,
        HowellError::InvalidArgument(_) => INVALID_PARAMS,
        HowellError::Conflict(_) => -32003,
        HowellError::Unauthorized(_) => -32004,
        HowellError::Transport(_) => -32005,
        HowellError::CorruptStore(_) => -32006,
        HowellError::Internal(_) => INTERNAL_ERROR,
    }
}

/// Render a JSON-RPC error object for one failed `tools/call` or
/// method dispatch.
pub fn to_json_rpc_error(err: &HowellError) -> Value {
    json!({
        "code": code_for(err),
        "message": err.to_string(),
        "data": { "kind": err.kind() },
    })
}

/// Build the `{error: "<kind>: message"}` body the spec's `tools/call`
/// envelope carries as its single text content item on failure
/// (§4.6: "isError ... derived from whether the result is a
/// single-key object with key `error`").
pub fn error_result_body(err: &HowellError) -> Value {
    json!({ "error": format!("{}: {}", err.kind(), err) })
}
