//! `GET /twilio/call` — carrier media stream upgrade (spec.md §4.3, §6).

use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn carrier_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| call_bridge::run_carrier_bridge(socket, state.bridge_deps.clone()))
}
