//! Host transport surface (spec.md §6). The host's own wire protocol for
//! this stream is an external collaborator and out of scope; these two
//! routes exist only so the host has somewhere to connect and post to.

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream;
use serde::Deserialize;

use crate::state::AppState;

/// `GET /mcp` — host transport stream endpoint. Emits a single `ready`
/// event and holds the connection open; the host's own framing for tool
/// calls over this stream is not implemented here (out of scope per
/// spec.md §4.7).
pub async fn stream() -> impl IntoResponse {
    let ready = Event::default().event("ready").data("{}");
    Sse::new(stream::once(async move { Ok::<_, std::convert::Infallible>(ready) }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    #[allow(dead_code)]
    pub session_id: String,
}

/// `POST /mcp/messages?sessionId=<hostSessionId>` — host transport post
/// endpoint. Accepted and acknowledged; dispatch to the named tool
/// operations lives in `api::tools`.
pub async fn messages(
    State(_state): State<AppState>,
    Query(_q): Query<MessagesQuery>,
    body: Json<serde_json::Value>,
) -> impl IntoResponse {
    tracing::debug!(?body, "mcp message received");
    Json(serde_json::json!({"accepted": true}))
}
