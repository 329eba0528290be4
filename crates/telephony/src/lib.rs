//! Telephony Control Plane (spec.md §4.4): outbound call creation, the
//! call-control document, and carrier status callback handling.

pub mod client;
pub mod status;
pub mod twiml;

use call_domain::config::Config;
use call_domain::model::CallBrief;
use call_session_core::{SessionStore, ViewerTokenService};
use serde::Serialize;

pub use client::{CarrierClient, CreateCallResult};
pub use status::map_carrier_status;
pub use twiml::render_call_control_document;

/// `spec.md` §4.4 `CallStartResult` / §4.7 `initiate-call` return shape.
#[derive(Debug, Clone, Serialize)]
pub struct CallStartResult {
    pub session_id: String,
    pub status: String,
    pub logs_ws_url: String,
    pub viewer_token: String,
    pub call_sid: Option<String>,
    pub error_message: Option<String>,
}

/// `<base>/twilio/logs` with the scheme rewritten to `ws(s)://`, matching
/// the call-control document's `<Stream>` URL rewrite (spec.md §4.4, §9).
pub fn logs_ws_url(config: &Config) -> String {
    format!(
        "{}/twilio/logs",
        config
            .server
            .public_url
            .trim_end_matches('/')
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    )
}

/// `startOutboundCall` (spec.md §4.4). Always returns a session id and
/// viewer token, even on carrier failure, so the widget can show the
/// failure without a second round trip.
pub async fn start_outbound_call(
    config: &Config,
    store: &SessionStore,
    token_service: &ViewerTokenService,
    brief: Option<CallBrief>,
) -> CallStartResult {
    let session_id = store.create_session(brief);
    let viewer_token = token_service.mint(&session_id, config.viewer_auth.ttl_secs);
    let logs_ws_url = logs_ws_url(config);

    if !config.twilio.is_configured() {
        let message = "Twilio is not configured. Set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, and TWILIO_FROM_NUMBER.".to_string();
        store.update_status(
            &session_id,
            call_domain::model::CallStatus::Failed,
            Some(message.clone()),
        );
        return CallStartResult {
            session_id,
            status: call_domain::model::CallStatus::Failed.as_str().to_string(),
            logs_ws_url,
            viewer_token,
            call_sid: None,
            error_message: Some(message),
        };
    }

    let Some(to) = config.twilio.to_number_default.clone() else {
        let message = "No callee number configured (TWILIO_TO_NUMBER_DEFAULT).".to_string();
        store.update_status(
            &session_id,
            call_domain::model::CallStatus::Failed,
            Some(message.clone()),
        );
        return CallStartResult {
            session_id,
            status: call_domain::model::CallStatus::Failed.as_str().to_string(),
            logs_ws_url,
            viewer_token,
            call_sid: None,
            error_message: Some(message),
        };
    };

    let carrier = CarrierClient::new(
        config.twilio.account_sid.clone().unwrap_or_default(),
        config.twilio.auth_token.clone().unwrap_or_default(),
    );
    let base = config.server.public_url.trim_end_matches('/');
    let twiml_url = format!("{base}/twilio/twiml?sessionId={session_id}");
    let status_callback_url = format!("{base}/twilio/status?sessionId={session_id}");
    let from = config.twilio.from_number.clone().unwrap_or_default();

    match carrier
        .create_call(&to, &from, &twiml_url, &status_callback_url)
        .await
    {
        Ok(result) => {
            store.set_carrier_call_id(&session_id, &result.carrier_call_id);
            let mapped = map_carrier_status(&result.raw_status);
            store.update_status(&session_id, mapped, None);
            CallStartResult {
                session_id,
                status: mapped.as_str().to_string(),
                logs_ws_url,
                viewer_token,
                call_sid: Some(result.carrier_call_id),
                error_message: None,
            }
        }
        Err(err) => {
            let message = err.to_string();
            store.update_status(
                &session_id,
                call_domain::model::CallStatus::Failed,
                Some(message.clone()),
            );
            CallStartResult {
                session_id,
                status: call_domain::model::CallStatus::Failed.as_str().to_string(),
                logs_ws_url,
                viewer_token,
                call_sid: None,
                error_message: Some(message),
            }
        }
    }
}

/// `handleStatusCallback` (spec.md §4.4). Returns `false` if the session
/// id is unknown (caller should respond 404).
pub fn handle_status_callback(store: &SessionStore, session_id: &str, carrier_call_id: Option<&str>, raw_status: &str) -> bool {
    if !store.exists(session_id) {
        return false;
    }
    if let Some(id) = carrier_call_id {
        store.set_carrier_call_id(session_id, id);
    }
    let mapped = map_carrier_status(raw_status);
    store.update_status(session_id, mapped, None);
    true
}
