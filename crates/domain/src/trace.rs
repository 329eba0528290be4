use serde::Serialize;

/// Structured trace events emitted across the Call Session Core crates.
///
/// Each variant is logged as a single JSON-encoded `tracing` field so the
/// event stream can be grepped or shipped to a log sink without parsing
/// free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    StatusChanged {
        session_id: String,
        from: String,
        to: String,
        reason: Option<String>,
    },
    TranscriptDelta {
        session_id: String,
        item_id: String,
        speaker: String,
    },
    TranscriptFinal {
        session_id: String,
        item_id: String,
        speaker: String,
        chars: usize,
    },
    EventLogEvicted {
        session_id: String,
        evicted_seq: u64,
    },
    ViewerSubscribed {
        session_id: String,
        subscriber_id: String,
        since_seq: u64,
    },
    ViewerDropped {
        session_id: String,
        subscriber_id: String,
        reason: String,
    },
    BargeIn {
        session_id: String,
        sent_ms: u64,
        truncate_ms: u64,
    },
    RecoverableModelError {
        session_id: String,
        code: Option<String>,
        message: String,
    },
    SummaryGenerated {
        session_id: String,
        source: String,
        last_seq: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "call_event");
    }
}
