//! Realtime model wire protocol (spec.md §4.3, §6): JSON events tagged by
//! `type`, matching the event names used by the cloud realtime endpoint.
//! Only the events the bridge actually observes get a typed variant; the
//! rest fall into `Other` and are logged at debug without mutating state
//! (spec.md §9 "a catch-all bucket records the rest").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ModelInbound {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "response.output_audio.delta")]
    ResponseOutputAudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        content_index: Option<u32>,
        delta: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputAudioTranscriptionDelta { item_id: String, delta: String },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { item_id: String, transcript: String },

    #[serde(rename = "response.output_audio_transcript.delta")]
    OutputAudioTranscriptDelta { item_id: String, delta: String },
    #[serde(rename = "response.output_audio_transcript.done")]
    OutputAudioTranscriptDone { item_id: String, transcript: String },

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        item_id: String,
        #[serde(default)]
        previous_item_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted,

    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseRef },
    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded { item: OutputItemRef },
    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { error: ModelError },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputItemRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelError {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error codes the model is known to emit for a cancel/truncate racing a
/// response that already completed naturally (spec.md §4.3 "recoverable
/// interruption control error").
const RECOVERABLE_ERROR_CODES: &[&str] = &[
    "response_cancel_not_active",
    "conversation_item_not_found",
    "conversation_item_already_completed",
];

impl ModelError {
    /// True when this error is a known race between our barge-in controls
    /// and the model's own turn-taking, and should be logged at warn
    /// rather than fail the session.
    pub fn is_recoverable(&self, pending_event_ids: &std::collections::HashSet<String>) -> bool {
        if let Some(id) = &self.event_id {
            if pending_event_ids.contains(id) {
                return true;
            }
        }
        if let Some(code) = &self.code {
            if RECOVERABLE_ERROR_CODES.contains(&code.as_str()) {
                return true;
            }
        }
        if let Some(message) = &self.message {
            let lower = message.to_ascii_lowercase();
            if lower.contains("cancel") || lower.contains("truncate") {
                return true;
            }
        }
        false
    }
}

/// Build the `session.update` event sent once the model socket opens
/// (spec.md §4.3 "Model session configuration"). Uses `serde_json::json!`
/// rather than a typed struct, matching the teacher's minimal-templating
/// preference for one-shot request bodies (`providers::openai_compat`).
pub fn build_session_update(
    transcription_model: &str,
    voice: &str,
    instructions: &str,
) -> Value {
    serde_json::json!({
        "type": "session.update",
        "session": {
            "modalities": ["audio", "text"],
            "input_audio_format": "g711_ulaw",
            "output_audio_format": "g711_ulaw",
            "turn_detection": {
                "type": "server_vad",
                "interrupt_response": true,
            },
            "input_audio_transcription": { "model": transcription_model },
            "voice": voice,
            "instructions": instructions,
        }
    })
}

pub fn build_input_audio_append(payload_b64: &str) -> Value {
    serde_json::json!({
        "type": "input_audio_buffer.append",
        "audio": payload_b64,
    })
}

pub fn build_response_cancel(event_id: &str) -> Value {
    serde_json::json!({
        "type": "response.cancel",
        "event_id": event_id,
    })
}

pub fn build_item_truncate(
    event_id: &str,
    item_id: &str,
    content_index: u32,
    audio_end_ms: u32,
) -> Value {
    serde_json::json!({
        "type": "conversation.item.truncate",
        "event_id": event_id,
        "item_id": item_id,
        "content_index": content_index,
        "audio_end_ms": audio_end_ms,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct NoOp;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_type_falls_through_to_other() {
        let raw = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        let parsed: ModelInbound = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed, ModelInbound::Other));
    }

    #[test]
    fn parses_transcription_completed() {
        let raw = r#"{"type":"conversation.item.input_audio_transcription.completed","item_id":"R1","transcript":"Hello, this is Jerry."}"#;
        let parsed: ModelInbound = serde_json::from_str(raw).unwrap();
        match parsed {
            ModelInbound::InputAudioTranscriptionCompleted { item_id, transcript } => {
                assert_eq!(item_id, "R1");
                assert_eq!(transcript, "Hello, this is Jerry.");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn recoverable_error_by_code() {
        let err = ModelError {
            event_id: Some("unrelated".into()),
            code: Some("response_cancel_not_active".into()),
            message: None,
        };
        assert!(err.is_recoverable(&Default::default()));
    }

    #[test]
    fn recoverable_error_by_pending_event_id() {
        let mut pending = std::collections::HashSet::new();
        pending.insert("evt-1".to_string());
        let err = ModelError {
            event_id: Some("evt-1".into()),
            code: None,
            message: None,
        };
        assert!(err.is_recoverable(&pending));
    }

    #[test]
    fn non_recoverable_error() {
        let err = ModelError {
            event_id: Some("evt-9".into()),
            code: Some("invalid_request_error".into()),
            message: Some("missing required field".into()),
        };
        assert!(!err.is_recoverable(&Default::default()));
    }
}
