//! Legacy Server-Sent-Events transport (spec.md §4.6): a GET opens an
//! event stream keyed by a fresh session id and emits an `endpoint`
//! event naming the POST target (`?sessionId=<id>`). A POST to that
//! target replies 202 Accepted and the JSON-RPC response is dispatched
//! through the session's event queue as a `message` event. A keepalive
//! comment is written every 30s; the session is purged once a dispatch
//! finds its receiver gone (spec.md §4.6 "session lifetime ends on
//! stream close; the session map is purged then").

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use howell_core::Coordinator;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::dispatch::dispatch_one;
use crate::rpc::JsonRpcInbound;

struct Session {
    sender: mpsc::UnboundedSender<String>,
    /// Events dropped because the session's queue reader had already
    /// gone away (Design Notes: "choose drop-oldest and record the
    /// drop in a counter").
    dropped: AtomicU64,
}

/// The session map: session id -> event sender. Owns its own mutex
/// (spec.md §5); the stream writer holds no mutex while blocked on the
/// network — only lookups into this map take it, briefly.
#[derive(Clone, Default)]
pub struct SseSessions {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SseSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: String, sender: mpsc::UnboundedSender<String>) {
        self.inner.lock().unwrap().insert(
            id,
            Session {
                sender,
                dropped: AtomicU64::new(0),
            },
        );
    }

    /// Dispatch a payload to `id`'s queue; if the receiver is gone
    /// (stream closed), purge the session from the map.
    fn dispatch_to(&self, id: &str, message: String) {
        let mut sessions = self.inner.lock().unwrap();
        let closed = match sessions.get(id) {
            Some(session) => {
                if session.sender.send(message).is_err() {
                    session.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if closed {
            sessions.remove(id);
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[derive(Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// `GET /mcp/sse`: opens the stream and emits the first `endpoint`
/// event naming the POST target for this session.
pub async fn sse_stream(
    State((_coordinator, sessions)): State<(Arc<Coordinator>, SseSessions)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    sessions.insert(session_id.clone(), tx);

    let endpoint_event = Event::default()
        .event("endpoint")
        .data(format!("/mcp/sse/message?sessionId={session_id}"));
    let opening = stream::once(async move { Ok(endpoint_event) });

    let messages = UnboundedReceiverStream::new(rx).map(|payload| Ok(Event::default().event("message").data(payload)));

    Sse::new(opening.chain(messages)).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text(""))
}

/// `POST /mcp/sse/message?sessionId=<id>`: executes the request and
/// dispatches the JSON-RPC response through the matching session's
/// queue, replying 202 Accepted synchronously either way.
pub async fn sse_post(
    State((coordinator, sessions)): State<(Arc<Coordinator>, SseSessions)>,
    Query(query): Query<SessionQuery>,
    body: axum::body::Bytes,
) -> StatusCode {
    let inbound: JsonRpcInbound = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    for req in inbound.requests() {
        if let Some(resp) = dispatch_one(&coordinator, req).await {
            if let Ok(payload) = serde_json::to_string(&resp) {
                sessions.dispatch_to(&query.session_id, payload);
            }
        }
    }
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_map_starts_empty() {
        assert_eq!(SseSessions::new().active_count(), 0);
    }

    #[test]
    fn dispatch_to_unknown_session_is_a_no_op() {
        let sessions = SseSessions::new();
        sessions.dispatch_to("nope", "payload".to_string());
        assert_eq!(sessions.active_count(), 0);
    }

    #[test]
    fn dispatch_purges_session_once_receiver_is_dropped() {
        let sessions = SseSessions::new();
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        sessions.insert("s1".to_string(), tx);
        drop(rx);
        sessions.dispatch_to("s1", "payload".to_string());
        assert_eq!(sessions.active_count(), 0);
    }
}
