//! The tool-RPC transport (spec.md §4.6): a JSON-RPC 2.0 dialect
//! exposed over two transports that share one dispatcher —
//! Streamable HTTP (preferred) and legacy Server-Sent Events.
//!
//! Nothing in this crate performs authentication: the tool-RPC
//! transport is public by contract (§4.5 — "relies on localhost
//! binding and a separate session id"). The shared-secret and webhook
//! auth that gate the REST surface live in `mcp-server`.

pub mod dispatch;
pub mod error;
pub mod rpc;
pub mod tools;
pub mod transport_http;
pub mod transport_sse;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use howell_core::Coordinator;

pub use transport_sse::SseSessions;

/// Build the `/mcp` (streamable) and `/mcp/sse*` (legacy) routes,
/// mounted under the given coordinator. Callers nest this under
/// whatever base path they like; both transports share the one
/// dispatcher in [`dispatch`].
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let sessions = SseSessions::new();

    let streamable = {
        let coordinator = coordinator.clone();
        post(move |headers, body| {
            let coordinator = coordinator.clone();
            async move { transport_http::streamable_post(coordinator, headers, body).await }
        })
    };

    Router::new().route("/mcp", streamable).nest(
        "/mcp/sse",
        Router::new()
            .route("/", get(transport_sse::sse_stream))
            .route("/message", post(transport_sse::sse_post))
            .with_state((coordinator, sessions)),
    )
}
