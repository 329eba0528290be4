//! Summary Synthesizer (spec.md §4.6): turns a session transcript into a
//! structured post-call summary, preferring a remote model and falling back
//! to a keyword heuristic on any failure.
//!
//! The remote request follows the teacher's authenticated-POST-plus-JSON-body
//! shape (`providers::openai_compat::OpenAiCompatProvider::authed_post` /
//! `build_chat_body`), adapted to the Responses API's structured-output
//! request instead of chat completions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use call_domain::config::ModelConfig;
use call_domain::model::{Speaker, TranscriptItem};
use call_domain::trace::TraceEvent;
use call_session_core::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceRisk {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Remote,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub attendance_risk: AttendanceRisk,
    pub source: SummarySource,
}

struct CacheEntry {
    last_seq: u64,
    result: SummaryResult,
}

/// Cached remote/heuristic summaries keyed by session id (spec.md §4.6
/// "cache is a simple map"; concurrent duplicate remote calls are accepted).
pub struct SummarySynthesizer {
    store: Arc<SessionStore>,
    model: ModelConfig,
    contact_name: String,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl SummarySynthesizer {
    pub fn new(store: Arc<SessionStore>, model: ModelConfig, contact_name: String) -> Self {
        Self {
            store,
            model,
            contact_name,
            client: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// `getSummary(sessionId)` — `None` when the session is unknown.
    pub async fn get_summary(&self, session_id: &str) -> Option<SummaryResult> {
        let status = self.store.get_summary(session_id)?;
        let last_seq = status.last_seq;

        if let Some(entry) = self.cache.lock().get(session_id) {
            if entry.last_seq == last_seq {
                return Some(entry.result.clone());
            }
        }

        let transcript_prompt = build_transcript_prompt(&status.transcript, &self.contact_name);
        let result = if self.model.is_configured() && !transcript_prompt.is_empty() {
            match self.request_remote_summary(&transcript_prompt).await {
                Some(result) => result,
                None => heuristic_summary(&status.transcript),
            }
        } else {
            heuristic_summary(&status.transcript)
        };

        self.cache.lock().insert(
            session_id.to_string(),
            CacheEntry {
                last_seq,
                result: result.clone(),
            },
        );
        TraceEvent::SummaryGenerated {
            session_id: session_id.to_string(),
            source: match result.source {
                SummarySource::Remote => "remote".to_string(),
                SummarySource::Heuristic => "heuristic".to_string(),
            },
            last_seq,
        }
        .emit();
        Some(result)
    }

    async fn request_remote_summary(&self, transcript_prompt: &str) -> Option<SummaryResult> {
        let api_key = self.model.api_key.as_deref()?;
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "keyPoints": {"type": "array", "items": {"type": "string"}},
                "actionItems": {"type": "array", "items": {"type": "string"}},
                "attendanceRisk": {"type": "string", "enum": ["low", "medium", "high", "unknown"]},
            },
            "required": ["summary", "keyPoints", "actionItems", "attendanceRisk"],
            "additionalProperties": false,
        });
        let body = serde_json::json!({
            "model": self.model.summary_model,
            "input": transcript_prompt,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "call_summary",
                    "schema": schema,
                    "strict": true,
                }
            }
        });

        tracing::debug!(model = %self.model.summary_model, "requesting remote call summary");

        let resp = self
            .client
            .post("https://api.openai.com/v1/responses")
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "summary request failed"))
            .ok()?;

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "summary request returned non-OK status");
            return None;
        }

        let value: Value = resp.json().await.ok()?;
        let text = extract_output_text(&value)?;
        let payload: RemotePayload = serde_json::from_str(&text).ok()?;
        Some(SummaryResult {
            summary: payload.summary,
            key_points: payload.key_points,
            action_items: payload.action_items,
            attendance_risk: payload.attendance_risk,
            source: SummarySource::Remote,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemotePayload {
    summary: String,
    #[serde(rename = "keyPoints")]
    key_points: Vec<String>,
    #[serde(rename = "actionItems")]
    action_items: Vec<String>,
    #[serde(rename = "attendanceRisk")]
    attendance_risk: AttendanceRisk,
}

/// Pull the first `output_text` content part out of a Responses API payload.
fn extract_output_text(value: &Value) -> Option<String> {
    value
        .get("output")?
        .as_array()?
        .iter()
        .find_map(|item| item.get("content")?.as_array())
        .and_then(|parts| {
            parts.iter().find_map(|part| {
                if part.get("type")?.as_str()? == "output_text" {
                    part.get("text")?.as_str().map(str::to_string)
                } else {
                    None
                }
            })
        })
}

fn build_transcript_prompt(transcript: &[TranscriptItem], contact_name: &str) -> String {
    transcript
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| {
            let label = match item.speaker {
                Speaker::Assistant => "School Assistant",
                Speaker::Recipient => contact_name,
            };
            format!("{label}: {}", item.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const ACTION_ITEM_BASELINE: &[&str] = &[
    "Log the outcome of this call in the attendance system.",
    "Follow up if no improvement is seen within two school days.",
];

const TRANSPORT_KEYWORDS: &[&str] = &["transport", "bus", "ride"];
const HEALTH_KEYWORDS: &[&str] = &["sick", "doctor", "hospital", "ill"];

const HIGH_RISK_KEYWORDS: &[&str] = &[
    "homeless",
    "evict",
    "unsafe",
    "hospital",
    "emergency",
    "can't make",
];
const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "sick",
    "ill",
    "doctor",
    "transport",
    "bus",
    "ride",
    "work schedule",
    "shift",
    "anxiety",
    "stressed",
    "family issue",
];

/// Heuristic fallback (spec.md §4.6 step 5): natural-language summary from
/// the last two nonempty recipient turns (or assistant turns if the
/// recipient never spoke), a baseline action-item list extended by keyword
/// themes, and a keyword-banded attendance risk.
fn heuristic_summary(transcript: &[TranscriptItem]) -> SummaryResult {
    let nonblank: Vec<&TranscriptItem> = transcript
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .collect();

    if nonblank.is_empty() {
        return SummaryResult {
            summary: "No transcript was captured for this call.".into(),
            key_points: Vec::new(),
            action_items: ACTION_ITEM_BASELINE.iter().map(|s| s.to_string()).collect(),
            attendance_risk: AttendanceRisk::Unknown,
            source: SummarySource::Heuristic,
        };
    }

    let recipient_turns: Vec<&&TranscriptItem> = nonblank
        .iter()
        .filter(|item| item.speaker == Speaker::Recipient)
        .collect();
    let turns: Vec<&&TranscriptItem> = if recipient_turns.is_empty() {
        nonblank.iter().filter(|item| item.speaker == Speaker::Assistant).collect()
    } else {
        recipient_turns
    };
    let last_two: Vec<&str> = turns
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|item| item.text.trim())
        .collect();

    let summary = if last_two.is_empty() {
        "The call ended without a clear exchange.".to_string()
    } else {
        format!("The call concluded with: {}.", last_two.join(" ... "))
    };

    let full_text: String = nonblank
        .iter()
        .map(|item| item.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut action_items: Vec<String> =
        ACTION_ITEM_BASELINE.iter().map(|s| s.to_string()).collect();
    if TRANSPORT_KEYWORDS.iter().any(|kw| full_text.contains(kw)) {
        action_items.push("Coordinate transportation support with the family.".into());
    }
    if HEALTH_KEYWORDS.iter().any(|kw| full_text.contains(kw)) {
        action_items.push("Request a doctor's note if the absence is health-related.".into());
    }

    let attendance_risk = if HIGH_RISK_KEYWORDS.iter().any(|kw| full_text.contains(kw)) {
        AttendanceRisk::High
    } else if MEDIUM_RISK_KEYWORDS.iter().any(|kw| full_text.contains(kw)) {
        AttendanceRisk::Medium
    } else {
        AttendanceRisk::Low
    };

    let key_points = last_two.iter().map(|t| t.to_string()).collect();

    SummaryResult {
        summary,
        key_points,
        action_items,
        attendance_risk,
        source: SummarySource::Heuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_domain::config::ModelConfig;
    use call_domain::model::Speaker;
    use chrono::Utc;

    fn item(speaker: Speaker, text: &str, order: usize) -> TranscriptItem {
        TranscriptItem {
            item_id: format!("{speaker:?}-{order}"),
            speaker,
            text: text.to_string(),
            is_final: true,
            seq: order as u64 + 1,
            order,
            timestamp: Utc::now(),
        }
    }

    fn unconfigured_model() -> ModelConfig {
        ModelConfig {
            api_key: None,
            ..Default::default()
        }
    }

    #[test]
    fn empty_transcript_is_unknown_risk() {
        let result = heuristic_summary(&[]);
        assert_eq!(result.attendance_risk, AttendanceRisk::Unknown);
        assert_eq!(result.source, SummarySource::Heuristic);
    }

    #[test]
    fn high_risk_keyword_wins_over_medium() {
        let transcript = vec![item(
            Speaker::Recipient,
            "We are currently homeless and also a bit stressed.",
            0,
        )];
        let result = heuristic_summary(&transcript);
        assert_eq!(result.attendance_risk, AttendanceRisk::High);
    }

    #[test]
    fn medium_risk_keyword_without_high() {
        let transcript = vec![item(Speaker::Recipient, "My child has been sick all week.", 0)];
        let result = heuristic_summary(&transcript);
        assert_eq!(result.attendance_risk, AttendanceRisk::Medium);
    }

    #[test]
    fn no_keywords_is_low_risk() {
        let transcript = vec![item(Speaker::Recipient, "Thanks for calling, all is well.", 0)];
        let result = heuristic_summary(&transcript);
        assert_eq!(result.attendance_risk, AttendanceRisk::Low);
    }

    #[test]
    fn transport_keyword_extends_action_items() {
        let transcript = vec![item(
            Speaker::Recipient,
            "We missed the bus this morning.",
            0,
        )];
        let result = heuristic_summary(&transcript);
        assert!(result
            .action_items
            .iter()
            .any(|a| a.contains("transportation")));
    }

    #[test]
    fn falls_back_to_assistant_turns_when_recipient_silent() {
        let transcript = vec![item(Speaker::Assistant, "Leaving a voicemail.", 0)];
        let result = heuristic_summary(&transcript);
        assert!(result.summary.contains("voicemail"));
    }

    #[tokio::test]
    async fn unknown_session_returns_none() {
        let store = Arc::new(SessionStore::new(100));
        let synth = SummarySynthesizer::new(store, unconfigured_model(), "Jordan".into());
        assert!(synth.get_summary("nope").await.is_none());
    }

    #[tokio::test]
    async fn cache_is_reused_until_seq_advances() {
        let store = Arc::new(SessionStore::new(100));
        let id = store.create_session(None);
        store.append_transcript_final(&id, Speaker::Recipient, "r1", "All is well here.", None);
        let synth = SummarySynthesizer::new(store.clone(), unconfigured_model(), "Jordan".into());

        let first = synth.get_summary(&id).await.unwrap();
        let second = synth.get_summary(&id).await.unwrap();
        assert_eq!(first.summary, second.summary);

        store.append_transcript_final(&id, Speaker::Recipient, "r1", "Actually we are sick.", None);
        let third = synth.get_summary(&id).await.unwrap();
        assert_ne!(third.attendance_risk, first.attendance_risk);
    }
}
