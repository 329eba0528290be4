//! Core data model shared by every Call Session Core crate.
//!
//! Types here match `spec.md` §3 one-to-one: [`CallSession`], [`TranscriptItem`],
//! [`Event`], [`ViewerSubscription`] metadata, and the status enum.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `spec.md` §3: one of `ready, queued, ringing, in-progress, completed, failed`.
/// `ready` is a pseudo-status used only for the call-panel descriptor before
/// any session exists; real sessions always start at `queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Ready,
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
}

impl CallStatus {
    /// Terminal statuses never transition further (spec.md §3 invariants).
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Ready => "ready",
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Recipient,
    Assistant,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Recipient => "recipient",
            Speaker::Assistant => "assistant",
        }
    }
}

/// Free-text fields captured at session creation and interpolated into the
/// model's system prompt (spec.md §3, §4.3, §9 "Prompt template").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallBrief {
    #[serde(default)]
    pub reason_summary: Option<String>,
    #[serde(default)]
    pub context_from_chat: Option<String>,
    #[serde(default)]
    pub absence_stats: Option<String>,
}

/// `(speaker, item_id)` identifies a transcript item within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub item_id: String,
    pub speaker: Speaker,
    pub text: String,
    pub is_final: bool,
    pub seq: u64,
    pub order: usize,
    pub timestamp: DateTime<Utc>,
}

/// One entry in a session's monotonically-ordered event log (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "status")]
    Status { status: CallStatus },
    #[serde(rename = "transcript.delta")]
    TranscriptDelta {
        item_id: String,
        speaker: Speaker,
        text_delta: String,
        order: usize,
    },
    #[serde(rename = "transcript.final")]
    TranscriptFinal {
        item_id: String,
        speaker: Speaker,
        full_text: String,
        order: usize,
    },
    #[serde(rename = "audio.level")]
    AudioLevel { speaker: Speaker, level: f32 },
    #[serde(rename = "session.end")]
    SessionEnd { reason: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Full session state owned by the [`crate`] consumer — the session-core
/// crate's `SessionStore` is the only writer. Viewer handles are stored
/// out-of-line (by subscriber id) rather than inlined here so the session
/// struct stays `Clone`-free and indirection resolves cyclic references
/// (spec.md §9 "Cyclic relationships").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub session_id: String,
    pub carrier_call_id: Option<String>,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub terminal_reason: Option<String>,
    pub next_seq: u64,
    pub transcript_items: HashMap<(Speaker, String), TranscriptItem>,
    pub transcript_order: Vec<(Speaker, String)>,
    pub call_brief: Option<CallBrief>,
}

impl CallSession {
    pub fn new(session_id: String, call_brief: Option<CallBrief>) -> Self {
        Self {
            session_id,
            carrier_call_id: None,
            status: CallStatus::Queued,
            started_at: Utc::now(),
            ended_at: None,
            terminal_reason: None,
            next_seq: 1,
            transcript_items: HashMap::new(),
            transcript_order: Vec::new(),
            call_brief,
        }
    }
}

/// `spec.md` §4.1 `getSummary` return shape (not the post-call summary —
/// this is the lightweight status summary served to `call-status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub session_id: String,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub terminal_reason: Option<String>,
    pub last_seq: u64,
    pub transcript: Vec<TranscriptItem>,
}
