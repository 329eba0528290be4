//! Media Bridge orchestration (spec.md §4.3): the IO-heavy glue around the
//! pure decision logic in [`crate::wire_carrier`], [`crate::wire_model`],
//! [`crate::barge_in`], and [`crate::state_machine`].
//!
//! Shape follows the teacher's two halves of a bridged socket pair: the
//! carrier side is accepted server-side the way `nodes::ws::node_ws` accepts
//! a node connection (token-free here, bind timeout the same), and the model
//! side is an outbound client the way `node-sdk::client::NodeClient` dials
//! out — minus its reconnect loop, since a dropped model socket fails the
//! call outright (spec.md §7). Each socket's reads are pumped by a small
//! reader task into a single control loop that owns both write halves and
//! all bridge-local state, so nothing needs a lock beyond what `SessionStore`
//! already provides.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message as CarrierMessage, WebSocket};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as ModelMessage;
use uuid::Uuid;

use call_domain::audio;
use call_domain::config::Config;
use call_domain::model::{CallStatus, Speaker};
use call_domain::prompt;
use call_domain::trace::TraceEvent;
use call_session_core::SessionStore;

use crate::barge_in::{plan_barge_in, BargeInAction, PlaybackState};
use crate::state_machine::BridgeState;
use crate::wire_carrier::{CarrierInbound, CarrierMediaPayload, CarrierOutbound, CarrierStart};
use crate::wire_model::{
    build_input_audio_append, build_item_truncate, build_response_cancel, build_session_update,
    ModelInbound,
};

const BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handles the gateway crate wires up once at startup and passes to
/// every accepted carrier websocket.
#[derive(Clone)]
pub struct BridgeDeps {
    pub store: Arc<SessionStore>,
    pub config: Arc<Config>,
}

enum Inbound {
    Carrier(CarrierMessage),
    CarrierClosed,
    Model(ModelMessage),
    ModelClosed,
}

/// Entry point from the carrier websocket handler's `WebSocketUpgrade::on_upgrade`.
pub async fn run_carrier_bridge(socket: WebSocket, deps: BridgeDeps) {
    let (mut carrier_tx, mut carrier_rx) = socket.split();

    let bound = match tokio::time::timeout(BIND_TIMEOUT, wait_for_start(&mut carrier_rx)).await {
        Ok(Some(bound)) => bound,
        _ => {
            close_carrier(&mut carrier_tx, 1008, "no session binding within timeout").await;
            return;
        }
    };

    let Some(session_id) = resolve_session_id(&deps.store, &bound.start, bound.call_sid.as_deref())
    else {
        close_carrier(&mut carrier_tx, 1008, "unknown session").await;
        return;
    };

    tracing::info!(session_id, stream_sid = ?bound.stream_sid, "carrier bridge bound");
    if let Some(call_sid) = &bound.call_sid {
        deps.store.set_carrier_call_id(&session_id, call_sid);
    }

    let mut state = BridgeState::AwaitingStart.on_bound();

    let model_stream = match connect_model(&deps, &session_id).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(session_id, error = %err, "model connection failed");
            deps.store.update_status(
                &session_id,
                CallStatus::Failed,
                Some(format!("model connection failed: {err}")),
            );
            close_carrier(&mut carrier_tx, 1011, "upstream model unavailable").await;
            return;
        }
    };
    let (mut model_tx, mut model_rx) = model_stream.split();

    let session_update = build_session_update(
        &deps.config.model.realtime_transcription_model,
        &deps.config.model.realtime_voice,
        &prompt::render(
            deps.config.model.prompt_template_path.as_deref(),
            deps.config.model.system_prompt_fallback.as_deref(),
            deps.store.call_brief(&session_id).as_ref(),
            &deps.config.call_brief,
        ),
    );
    if model_tx
        .send(ModelMessage::Text(session_update.to_string()))
        .await
        .is_err()
    {
        close_carrier(&mut carrier_tx, 1011, "model session configuration failed").await;
        return;
    }

    deps.store
        .update_status(&session_id, CallStatus::InProgress, None);
    state = state.on_model_ready(CallStatus::InProgress);

    let (tx, mut rx) = mpsc::channel::<Inbound>(64);

    let carrier_reader = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = carrier_rx.next().await {
                match msg {
                    Ok(msg) => {
                        if tx.send(Inbound::Carrier(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = tx.send(Inbound::CarrierClosed).await;
        })
    };

    let model_reader = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = model_rx.next().await {
                match msg {
                    Ok(msg) => {
                        if tx.send(Inbound::Model(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = tx.send(Inbound::ModelClosed).await;
        })
    };
    drop(tx);

    let mut stream_sid = bound.stream_sid.unwrap_or_default();
    let mut carrier_frame_count: u64 = 0;
    let mut assistant_frame_count: u64 = 0;
    let mut playback = PlaybackState::default();
    let mut pending_event_ids: HashSet<String> = HashSet::new();
    let mut carrier_open = true;
    let mut model_open = true;

    while let Some(inbound) = rx.recv().await {
        match inbound {
            Inbound::Carrier(msg) => {
                if let CarrierMessage::Text(text) = msg {
                    handle_carrier_frame(
                        &text,
                        &session_id,
                        &deps.store,
                        &mut model_tx,
                        &mut stream_sid,
                        &mut carrier_frame_count,
                        &mut state,
                    )
                    .await;
                }
            }
            Inbound::CarrierClosed => {
                carrier_open = false;
                state = state.on_close_or_error();
                let _ = model_tx.close().await;
            }
            Inbound::Model(ModelMessage::Text(text)) => {
                handle_model_frame(
                    &text,
                    &session_id,
                    &deps.store,
                    &mut carrier_tx,
                    &mut model_tx,
                    &stream_sid,
                    &mut assistant_frame_count,
                    &mut playback,
                    &mut pending_event_ids,
                )
                .await;
            }
            Inbound::Model(_) => {}
            Inbound::ModelClosed => {
                model_open = false;
                state = state.on_close_or_error();
                let _ = carrier_tx.close().await;
            }
        }

        if !carrier_open && !model_open {
            state = state.on_both_sockets_closed();
            break;
        }
    }

    carrier_reader.abort();
    model_reader.abort();

    if !deps.store.is_terminal(&session_id) {
        deps.store
            .update_status(&session_id, CallStatus::Completed, Some("call ended".into()));
    }
    tracing::info!(session_id, ?state, "carrier bridge closed");
}

struct Bound {
    stream_sid: Option<String>,
    call_sid: Option<String>,
    start: CarrierStart,
}

/// Read carrier frames until a `start` event arrives (spec.md §4.3 "Bind-time
/// resolution"). Non-start frames before it are ignored.
async fn wait_for_start(
    carrier_rx: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Option<Bound> {
    while let Some(Ok(msg)) = carrier_rx.next().await {
        let CarrierMessage::Text(text) = msg else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<CarrierInbound>(&text) else {
            continue;
        };
        if let CarrierInbound::Start { start } = parsed {
            return Some(Bound {
                stream_sid: start.stream_sid.clone(),
                call_sid: start.call_sid.clone(),
                start,
            });
        }
    }
    None
}

/// Resolve the session bound to this socket either via the carrier's
/// `customParameters.sessionId`, or via the carrier-call-id reverse index
/// (spec.md §4.3 "Bind-time resolution").
fn resolve_session_id(
    store: &SessionStore,
    start: &CarrierStart,
    call_sid: Option<&str>,
) -> Option<String> {
    if let Some(id) = start.custom_parameters.get("sessionId") {
        if store.exists(id) {
            return Some(id.clone());
        }
    }
    call_sid.and_then(|sid| store.get_session_by_carrier_call_id(sid))
}

async fn connect_model(
    deps: &BridgeDeps,
    session_id: &str,
) -> Result<
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    String,
> {
    let api_key = deps
        .config
        .model
        .api_key
        .as_deref()
        .ok_or_else(|| "OPENAI_API_KEY not configured".to_string())?;
    let url = format!(
        "wss://api.openai.com/v1/realtime?model={}",
        deps.config.model.realtime_model
    );
    let mut request = url
        .into_client_request()
        .map_err(|e| format!("invalid model url: {e}"))?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {api_key}")
            .parse()
            .map_err(|e| format!("invalid auth header: {e}"))?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse().unwrap());

    tracing::debug!(session_id, "dialing realtime model");
    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| e.to_string())?;
    Ok(stream)
}

type ModelSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    ModelMessage,
>;
type CarrierSink = futures_util::stream::SplitSink<WebSocket, CarrierMessage>;

/// Forward a carrier frame per the forwarding contract (spec.md §4.3):
/// `media` frames become `input_audio_buffer.append`, sampled on the K-th
/// cadence for a recipient `audio.level` event; `stop` ends the call.
async fn handle_carrier_frame(
    text: &str,
    session_id: &str,
    store: &SessionStore,
    model_tx: &mut ModelSink,
    stream_sid: &mut String,
    frame_count: &mut u64,
    state: &mut BridgeState,
) {
    let Ok(parsed) = serde_json::from_str::<CarrierInbound>(text) else {
        return;
    };
    match parsed {
        CarrierInbound::Start { start } => {
            if let Some(sid) = start.stream_sid {
                *stream_sid = sid;
            }
        }
        CarrierInbound::Media { media } => {
            *frame_count += 1;
            if (*frame_count).is_multiple_of(audio::LEVEL_SAMPLE_CADENCE) {
                if let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(&media.payload) {
                    let level = audio::audio_level(&raw);
                    store.append_audio_level(session_id, Speaker::Recipient, level);
                }
            }
            let append = build_input_audio_append(&media.payload);
            let _ = model_tx
                .send(ModelMessage::Text(append.to_string()))
                .await;
        }
        CarrierInbound::Stop { stop } => {
            store.update_status(session_id, CallStatus::Completed, stop.reason);
            *state = state.on_close_or_error();
            let _ = model_tx.close().await;
        }
        CarrierInbound::Connected { .. } | CarrierInbound::Mark { .. } | CarrierInbound::Other => {}
    }
}

/// Forward a model event per the forwarding contract (spec.md §4.3):
/// assistant audio deltas go back to the carrier and get sampled for
/// `audio.level`; transcription deltas/finals land in the transcript;
/// `speech_started` triggers [`plan_barge_in`]; recoverable errors log at
/// warn, non-recoverable ones fail the session.
#[allow(clippy::too_many_arguments)]
async fn handle_model_frame(
    text: &str,
    session_id: &str,
    store: &SessionStore,
    carrier_tx: &mut CarrierSink,
    model_tx: &mut ModelSink,
    stream_sid: &str,
    assistant_frame_count: &mut u64,
    playback: &mut PlaybackState,
    pending_event_ids: &mut HashSet<String>,
) {
    let Ok(parsed) = serde_json::from_str::<ModelInbound>(text) else {
        return;
    };
    match parsed {
        ModelInbound::ResponseCreated { response } => {
            playback.response_id = Some(response.id);
            playback.playback_started_at = Some(Instant::now());
        }
        ModelInbound::ResponseOutputItemAdded { item } => {
            playback.item_id = item.id;
            playback.content_index = 0;
            playback.sent_ms = 0;
        }
        ModelInbound::ResponseOutputAudioDelta { delta, .. } => {
            if let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(&delta) {
                playback.sent_ms += audio::bytes_to_millis(raw.len());
            }
            *assistant_frame_count += 1;
            if (*assistant_frame_count).is_multiple_of(audio::LEVEL_SAMPLE_CADENCE) {
                if let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(&delta) {
                    let level = audio::audio_level(&raw);
                    store.append_audio_level(session_id, Speaker::Assistant, level);
                }
            }
            let frame = CarrierOutbound::Media {
                stream_sid: stream_sid.to_string(),
                media: CarrierMediaPayload { payload: delta },
            };
            if let Ok(json) = serde_json::to_string(&frame) {
                let _ = carrier_tx.send(CarrierMessage::Text(json)).await;
            }
        }
        ModelInbound::ResponseDone => {
            playback.clear();
        }
        ModelInbound::InputAudioTranscriptionDelta { item_id, delta } => {
            store.append_transcript_delta(session_id, Speaker::Recipient, &item_id, &delta, None);
        }
        ModelInbound::InputAudioTranscriptionCompleted { item_id, transcript } => {
            store.append_transcript_final(
                session_id,
                Speaker::Recipient,
                &item_id,
                &transcript,
                None,
            );
        }
        ModelInbound::OutputAudioTranscriptDelta { item_id, delta } => {
            store.append_transcript_delta(session_id, Speaker::Assistant, &item_id, &delta, None);
        }
        ModelInbound::OutputAudioTranscriptDone { item_id, transcript } => {
            store.append_transcript_final(
                session_id,
                Speaker::Assistant,
                &item_id,
                &transcript,
                None,
            );
        }
        ModelInbound::InputAudioBufferCommitted {
            item_id,
            previous_item_id,
        } => {
            store.record_transcript_order(
                session_id,
                Speaker::Recipient,
                &item_id,
                previous_item_id.as_deref(),
            );
        }
        ModelInbound::InputAudioBufferSpeechStarted => {
            let elapsed_ms = playback
                .playback_started_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);
            let actions = plan_barge_in(playback, elapsed_ms, || Uuid::new_v4().to_string());
            if !actions.is_empty() {
                TraceEvent::BargeIn {
                    session_id: session_id.to_string(),
                    sent_ms: playback.sent_ms,
                    truncate_ms: playback.sent_ms.min(elapsed_ms),
                }
                .emit();
            }
            for action in actions {
                match action {
                    BargeInAction::CarrierClear => {
                        let frame = CarrierOutbound::Clear {
                            stream_sid: stream_sid.to_string(),
                        };
                        if let Ok(json) = serde_json::to_string(&frame) {
                            let _ = carrier_tx.send(CarrierMessage::Text(json)).await;
                        }
                    }
                    BargeInAction::ModelResponseCancel { event_id } => {
                        pending_event_ids.insert(event_id.clone());
                        let cancel = build_response_cancel(&event_id);
                        let _ = model_tx
                            .send(ModelMessage::Text(cancel.to_string()))
                            .await;
                    }
                    BargeInAction::ModelItemTruncate {
                        event_id,
                        item_id,
                        content_index,
                        audio_end_ms,
                    } => {
                        pending_event_ids.insert(event_id.clone());
                        let truncate =
                            build_item_truncate(&event_id, &item_id, content_index, audio_end_ms);
                        let _ = model_tx
                            .send(ModelMessage::Text(truncate.to_string()))
                            .await;
                    }
                }
            }
            playback.clear();
        }
        ModelInbound::Error { error } => {
            if error.is_recoverable(pending_event_ids) {
                TraceEvent::RecoverableModelError {
                    session_id: session_id.to_string(),
                    code: error.code.clone(),
                    message: error.message.clone().unwrap_or_default(),
                }
                .emit();
            } else {
                tracing::error!(session_id, ?error.code, ?error.message, "fatal model error");
                store.update_status(
                    session_id,
                    CallStatus::Failed,
                    Some(error.message.unwrap_or_else(|| "model error".into())),
                );
            }
        }
        ModelInbound::SessionCreated
        | ModelInbound::SessionUpdated
        | ModelInbound::Other => {}
    }
}

async fn close_carrier(carrier_tx: &mut CarrierSink, code: u16, reason: &str) {
    let _ = carrier_tx
        .send(CarrierMessage::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}
