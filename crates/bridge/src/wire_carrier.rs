//! Carrier media-stream wire protocol (spec.md §4.3, §6): JSON frames with
//! an `event` tag, following the teacher's internally-tagged `WsMessage`
//! idiom (`node_protocol::WsMessage`) applied to the carrier's shape
//! instead of the node protocol's.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierInbound {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start {
        start: CarrierStart,
    },
    Media {
        media: CarrierMedia,
    },
    Stop {
        #[serde(default)]
        stop: CarrierStop,
    },
    Mark {
        #[serde(default)]
        mark: CarrierMark,
    },
    /// Unrecognized carrier events are parsed but never mutate state
    /// (spec.md §9 "a catch-all bucket records the rest").
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierStart {
    #[serde(default, rename = "streamSid")]
    pub stream_sid: Option<String>,
    #[serde(default, rename = "callSid")]
    pub call_sid: Option<String>,
    #[serde(default, rename = "customParameters")]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierStop {
    #[serde(default, rename = "callSid")]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierMark {
    #[serde(default)]
    pub name: Option<String>,
}

/// Outbound frames sent back to the carrier on the same media stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierOutbound {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: CarrierMediaPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CarrierMediaPayload {
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_custom_parameters() {
        let raw = r#"{"event":"start","start":{"streamSid":"MZ1","callSid":"CA1","customParameters":{"sessionId":"s1"}}}"#;
        let parsed: CarrierInbound = serde_json::from_str(raw).unwrap();
        match parsed {
            CarrierInbound::Start { start } => {
                assert_eq!(start.call_sid.as_deref(), Some("CA1"));
                assert_eq!(start.custom_parameters.get("sessionId").unwrap(), "s1");
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_event_falls_through_to_other() {
        let raw = r#"{"event":"dtmf","digit":"5"}"#;
        let parsed: CarrierInbound = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed, CarrierInbound::Other));
    }

    #[test]
    fn serializes_clear_frame() {
        let frame = CarrierOutbound::Clear {
            stream_sid: "MZ1".into(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"event":"clear","streamSid":"MZ1"}"#);
    }
}
