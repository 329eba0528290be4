//! `GET /twilio/logs?sessionId=<id>&viewerToken=<t>&sinceSeq=<n>` — viewer
//! fan-out (spec.md §4.5, §5): catch-up then live, strictly ascending
//! `seq` per viewer, 20s ping heartbeat, 1008 close on auth failure.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(20);
const TERMINAL_FLUSH_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "viewerToken")]
    viewer_token: String,
    #[serde(rename = "sinceSeq", default)]
    since_seq: u64,
}

pub async fn viewer_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<ViewerQuery>,
) -> impl IntoResponse {
    if !state.store.exists(&q.session_id) || !state.tokens.verify(&q.session_id, &q.viewer_token) {
        return ws
            .on_upgrade(close_unauthorized)
            .into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, q))
        .into_response()
}

async fn close_unauthorized(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: 1008,
            reason: "unauthorized".into(),
        })))
        .await;
}

async fn handle_socket(socket: WebSocket, state: AppState, q: ViewerQuery) {
    let (mut sink, mut stream) = socket.split();

    let Some((subscriber_id, catch_up, mut rx)) =
        state.store.subscribe(&q.session_id, q.since_seq)
    else {
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: 1008,
                reason: "unknown session".into(),
            })))
            .await;
        return;
    };

    for event in &catch_up {
        if send_event(&mut sink, event).await.is_err() {
            state.store.unsubscribe(&q.session_id, &subscriber_id);
            return;
        }
    }

    if state.store.is_terminal(&q.session_id) {
        tokio::time::sleep(TERMINAL_FLUSH_DELAY).await;
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "session ended".into(),
            })))
            .await;
        state.store.unsubscribe(&q.session_id, &subscriber_id);
        return;
    }

    let mut ping_timer = tokio::time::interval(PING_INTERVAL);
    ping_timer.tick().await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_timer.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.store.unsubscribe(&q.session_id, &subscriber_id);
}

async fn send_event(
    sink: &mut (impl SinkExt<Message> + Unpin),
    event: &call_domain::model::Event,
) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
