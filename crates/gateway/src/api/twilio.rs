//! Telephony Control Plane HTTP surface (spec.md §4.4, §6).

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;

use call_telephony::render_call_control_document;

use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SessionIdQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// `GET|POST /twilio/twiml?sessionId=<id>` — the call-control document.
/// 404 for unknown sessions, `text/xml; charset=utf-8`, never cached.
pub async fn call_control_document(
    State(state): State<AppState>,
    Query(q): Query<SessionIdQuery>,
) -> Response {
    if !state.store.exists(&q.session_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let doc = render_call_control_document(&state.config.server.public_url, &q.session_id);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        doc,
    )
        .into_response()
}

/// `POST /twilio/status?sessionId=<id>` — carrier status callback. 404 if
/// the session is unknown, else 204.
pub async fn status_callback(
    State(state): State<AppState>,
    Query(q): Query<SessionIdQuery>,
    Form(body): Form<HashMap<String, String>>,
) -> StatusCode {
    let raw_status = body.get("CallStatus").map(String::as_str).unwrap_or("");
    let carrier_call_id = body.get("CallSid").map(String::as_str);
    if call_telephony::handle_status_callback(&state.store, &q.session_id, carrier_call_id, raw_status)
    {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
