//! End-to-end scenarios against the assembled router (spec.md §8).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

use call_domain::config::{CallBriefDefaults, Config, ModelConfig, ServerConfig, TwilioConfig, ViewerAuthConfig};

use crate::bootstrap::build_app_state;
use crate::state::AppState;

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            public_url: "http://localhost:8000".into(),
            event_log_cap: 5000,
        },
        twilio: TwilioConfig::default(),
        model: ModelConfig::default(),
        viewer_auth: ViewerAuthConfig {
            secret: "test-secret".into(),
            ttl_secs: 600,
        },
        call_brief: CallBriefDefaults::default(),
    }
}

fn test_state() -> AppState {
    build_app_state(Arc::new(test_config()))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// Scenario B — carrier create fails when Twilio is not configured.
#[tokio::test]
async fn initiate_call_without_twilio_config_fails() {
    let state = test_state();
    let app = crate::api::router().with_state(state);

    let req = Request::builder()
        .method("POST")
        .uri("/tools/initiate-call")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"reasonSummary":"Absent 3 days this week"}"#))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let structured = &body["structuredContent"];
    assert_eq!(structured["status"], "failed");
    assert!(structured["error_message"]
        .as_str()
        .unwrap()
        .contains("Twilio is not configured"));
    assert!(structured["session_id"].as_str().is_some());
}

// `call-status` on an unknown session returns `{found: false}`.
#[tokio::test]
async fn call_status_unknown_session_not_found() {
    let state = test_state();
    let app = crate::api::router().with_state(state);

    let req = Request::builder()
        .method("POST")
        .uri("/tools/call-status")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"sessionId":"does-not-exist"}"#))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["structuredContent"]["found"], false);
}

// `GET /twilio/twiml` 404s for an unknown session, 200s with the
// call-control document for a known one.
#[tokio::test]
async fn twiml_document_requires_known_session() {
    let state = test_state();
    let session_id = state.store.create_session(None);
    let app = crate::api::router().with_state(state);

    let unknown = Request::builder()
        .uri("/twilio/twiml?sessionId=not-real")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(unknown).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let known = Request::builder()
        .uri(format!("/twilio/twiml?sessionId={session_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(known).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let doc = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(doc.contains(&session_id));
}

// Scenario F — a viewer token minted for one session must not unlock
// another session's log stream.
#[tokio::test]
async fn viewer_rejects_token_minted_for_different_session() {
    let state = test_state();
    let s1 = state.store.create_session(None);
    let s2 = state.store.create_session(None);
    let token_for_s1 = state.tokens.mint(&s1, 600);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::api::router().with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("ws://{addr}/twilio/logs?sessionId={s2}&viewerToken={token_for_s1}&sinceSeq=0");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    let closed = loop {
        match ws.next().await {
            Some(Ok(WsMessage::Close(frame))) => break frame,
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => break None,
        }
    };
    assert_eq!(closed.unwrap().code, tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(1008));
}

// Scenario C — viewer reconnect: catch-up delivers exactly the events
// strictly after `sinceSeq`.
#[tokio::test]
async fn viewer_catch_up_respects_since_seq() {
    let state = test_state();
    let session_id = state.store.create_session(None);
    state.store.update_status(&session_id, call_domain::model::CallStatus::Ringing, None);
    state.store.update_status(&session_id, call_domain::model::CallStatus::InProgress, None);
    state.store.append_transcript_final(&session_id, call_domain::model::Speaker::Recipient, "r1", "Hello", None);
    let token = state.tokens.mint(&session_id, 600);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::api::router().with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("ws://{addr}/twilio/logs?sessionId={session_id}&viewerToken={token}&sinceSeq=2");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let mut seqs = Vec::new();
    for _ in 0..2 {
        match tokio::time::timeout(std::time::Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
        {
            WsMessage::Text(text) => {
                let event: serde_json::Value = serde_json::from_str(&text).unwrap();
                seqs.push(event["seq"].as_u64().unwrap());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(seqs, vec![3, 4]);
    let _ = ws.close(None).await;
}
