//! `GET /healthz` (teacher's `api::admin::health` pattern; SPEC_FULL.md §6
//! ambient-observability supplement — process uptime and active session
//! count, not a spec.md Non-goal).

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "activeSessions": state.store.session_count(),
    }))
}
