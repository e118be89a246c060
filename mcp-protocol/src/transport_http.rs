//! Streamable HTTP transport (spec.md §4.6, preferred): a single POST
//! carries a request object or a batch array; the response carries the
//! response object or a batch; an all-notification input gets 202 with
//! no body. A session id is echoed via `Mcp-Session-Id`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use howell_core::Coordinator;
use serde_json::{json, Value};

use crate::dispatch::dispatch_one;
use crate::rpc::{JsonRpcInbound, JsonRpcOutbound};

const SESSION_HEADER: &str = "mcp-session-id";

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Handler for `POST /mcp` (the streamable transport's single endpoint).
pub async fn streamable_post(
    coordinator: Arc<Coordinator>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = session_id(&headers);

    let inbound: JsonRpcInbound = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let err = json!({
                "jsonrpc": "2.0",
                "error": {"code": -32700, "message": format!("parse error: {e}")},
                "id": Value::Null,
            });
            return with_session(
                (StatusCode::BAD_REQUEST, axum::Json(err)).into_response(),
                &session,
            );
        }
    };
    let requests = inbound.requests();

    if requests.iter().all(|r| r.is_notification()) {
        // Notifications still execute; they simply get no response body.
        for req in requests {
            let _ = dispatch_one(&coordinator, req).await;
        }
        return with_session((StatusCode::ACCEPTED, ()).into_response(), &session);
    }

    let mut responses = Vec::with_capacity(requests.len());
    for req in requests {
        if let Some(resp) = dispatch_one(&coordinator, req).await {
            responses.push(resp);
        }
    }

    let outbound = if responses.len() == 1 {
        JsonRpcOutbound::Single(responses.into_iter().next().unwrap())
    } else {
        JsonRpcOutbound::Batch(responses)
    };

    with_session((StatusCode::OK, axum::Json(outbound)).into_response(), &session)
}

fn with_session(mut response: Response, session: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_header_is_read_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(session_id(&headers), "abc-123");
    }

    #[test]
    fn missing_session_header_generates_one() {
        let headers = HeaderMap::new();
        assert!(!session_id(&headers).is_empty());
    }
}
