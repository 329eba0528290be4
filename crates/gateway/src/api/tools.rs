//! Tool/Asset Plane HTTP contract (spec.md §4.7; the host's own
//! tool-dispatch protocol is an external collaborator and not implemented
//! here — only the four named operations' request/response shapes are).

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use call_domain::model::CallBrief;
use call_telephony::logs_ws_url;

use crate::state::AppState;

fn envelope(widget: &str, structured_content: Value) -> Json<Value> {
    let text = structured_content.to_string();
    Json(json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": structured_content,
        "_meta": {"outputTemplate": format!("ui://widget/{widget}.html")},
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallBriefRequest {
    #[serde(rename = "reasonSummary")]
    pub reason_summary: String,
    #[serde(rename = "contextFromChat", default)]
    pub context_from_chat: Option<String>,
    #[serde(rename = "absenceStats", default)]
    pub absence_stats: Option<String>,
}

impl CallBriefRequest {
    fn into_brief(self) -> CallBrief {
        CallBrief {
            reason_summary: Some(self.reason_summary),
            context_from_chat: self.context_from_chat,
            absence_stats: self.absence_stats,
        }
    }
}

/// `open-call-panel(reasonSummary, contextFromChat?, absenceStats?)` —
/// a descriptor the widget renders before any call has been placed.
pub async fn open_call_panel(
    State(state): State<AppState>,
    Json(req): Json<CallBriefRequest>,
) -> impl IntoResponse {
    let defaults = &state.config.call_brief;
    let structured = json!({
        "sessionId": Value::Null,
        "displayNumber": state.config.twilio.to_number_default,
        "studentName": defaults.student_name,
        "parentName": defaults.parent_name,
        "parentRelationship": defaults.parent_relationship,
        "parentNumberLabel": defaults.parent_number_label,
        "status": "ready",
        "logsWsUrl": logs_ws_url(&state.config),
        "reconnectSinceSeq": 0,
        "reasonSummary": req.reason_summary,
        "contextFromChat": req.context_from_chat,
        "absenceStats": req.absence_stats,
    });
    envelope("call-panel", structured)
}

/// `initiate-call(reasonSummary, contextFromChat?, absenceStats?)` —
/// places the outbound call and returns a `CallStartResult`.
pub async fn initiate_call(
    State(state): State<AppState>,
    Json(req): Json<CallBriefRequest>,
) -> impl IntoResponse {
    let result = call_telephony::start_outbound_call(
        &state.config,
        &state.store,
        &state.tokens,
        Some(req.into_brief()),
    )
    .await;
    let structured = serde_json::to_value(&result).unwrap_or_else(|_| json!({}));
    envelope("call-panel", structured)
}

#[derive(Debug, Deserialize)]
pub struct SessionIdRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// `call-status(sessionId)` — the session's current status summary
/// (spec.md §4.1), or `{found: false}` for an unknown session.
pub async fn call_status(
    State(state): State<AppState>,
    Json(req): Json<SessionIdRequest>,
) -> impl IntoResponse {
    let structured = match state.store.get_summary(&req.session_id) {
        Some(summary) => {
            let mut value = serde_json::to_value(&summary).unwrap_or_else(|_| json!({}));
            if let Value::Object(ref mut map) = value {
                map.insert("found".to_string(), json!(true));
            }
            value
        }
        None => json!({"found": false}),
    };
    envelope("call-panel", structured)
}

/// `summarise-call(sessionId)` — the post-call structured summary
/// (spec.md §4.6), or `{found: false}` for an unknown session.
pub async fn summarise_call(
    State(state): State<AppState>,
    Json(req): Json<SessionIdRequest>,
) -> impl IntoResponse {
    let structured = match state.summary.get_summary(&req.session_id).await {
        Some(summary) => {
            let mut value = serde_json::to_value(&summary).unwrap_or_else(|_| json!({}));
            if let Value::Object(ref mut map) = value {
                map.insert("found".to_string(), json!(true));
            }
            value
        }
        None => json!({"found": false}),
    };
    envelope("call-summary", structured)
}
