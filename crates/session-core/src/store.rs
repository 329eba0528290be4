//! Event Log & Session Store (spec.md §4.1).
//!
//! Two-tier locking, matching the teacher's separation between a registry
//! map lock and per-entry locks (`sa-gateway::nodes::registry::NodeRegistry`
//! generalized from "connected nodes" to "active call sessions"): the
//! session-id → session map has its own `RwLock`, and every session has its
//! own `Mutex` guarding the event log, transcript, and viewer set. The
//! session lock is held only for the serialize+dispatch step of an append
//! so a slow viewer can never block another session's progress, nor even
//! another append to the *same* session beyond that step (spec.md §5).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use call_domain::model::{
    CallBrief, CallSession, CallStatus, Event, EventKind, Speaker, StatusSummary, TranscriptItem,
};
use call_domain::trace::TraceEvent;

/// Outbound channel to one viewer. Bounded so a stalled browser backs up
/// to a bounded depth, never unbounded memory growth (spec.md §5, §9).
const VIEWER_CHANNEL_DEPTH: usize = 256;

/// Grace period between a terminal status transition and closing every
/// viewer subscriber for that session (spec.md §4.1 "schedules viewer
/// drain").
const VIEWER_DRAIN_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

struct Viewer {
    tx: mpsc::Sender<Event>,
}

struct SessionInner {
    session: CallSession,
    event_log: VecDeque<Event>,
    event_log_cap: usize,
    viewers: HashMap<String, Viewer>,
}

impl SessionInner {
    fn new(session_id: String, call_brief: Option<CallBrief>, cap: usize) -> Self {
        Self {
            session: CallSession::new(session_id, call_brief),
            event_log: VecDeque::new(),
            event_log_cap: cap,
            viewers: HashMap::new(),
        }
    }

    /// Assign the next `seq`, append to the log (evicting the oldest entry
    /// if over capacity), and broadcast non-blockingly to every viewer.
    /// Viewers that can't accept the write are dropped from the set.
    fn append(&mut self, kind: EventKind) -> Event {
        let seq = self.session.next_seq;
        self.session.next_seq += 1;
        let event = Event {
            seq,
            timestamp: Utc::now(),
            kind,
        };
        self.event_log.push_back(event.clone());
        if self.event_log.len() > self.event_log_cap {
            if let Some(evicted) = self.event_log.pop_front() {
                TraceEvent::EventLogEvicted {
                    session_id: self.session.session_id.clone(),
                    evicted_seq: evicted.seq,
                }
                .emit();
            }
        }
        let mut dead = Vec::new();
        for (id, viewer) in &self.viewers {
            if viewer.tx.try_send(event.clone()).is_err() {
                dead.push(id.clone());
            }
        }
        for id in dead {
            self.viewers.remove(&id);
            TraceEvent::ViewerDropped {
                session_id: self.session.session_id.clone(),
                subscriber_id: id,
                reason: "send failed".into(),
            }
            .emit();
        }
        event
    }

    fn events_since(&self, since_seq: u64) -> Vec<Event> {
        self.event_log
            .iter()
            .filter(|e| e.seq > since_seq)
            .cloned()
            .collect()
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionInner>>>>,
    carrier_index: RwLock<HashMap<String, String>>,
    event_log_cap: usize,
}

impl SessionStore {
    pub fn new(event_log_cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            carrier_index: RwLock::new(HashMap::new()),
            event_log_cap,
        }
    }

    /// `createSession` — allocate a fresh session, `queued`, with an
    /// initial `status{queued}` event.
    pub fn create_session(&self, call_brief: Option<CallBrief>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let inner = Arc::new(Mutex::new(SessionInner::new(
            session_id.clone(),
            call_brief,
            self.event_log_cap,
        )));
        inner.lock().append(EventKind::Status {
            status: CallStatus::Queued,
        });
        self.sessions.write().insert(session_id.clone(), inner);
        TraceEvent::SessionCreated {
            session_id: session_id.clone(),
        }
        .emit();
        session_id
    }

    fn get_inner(&self, session_id: &str) -> Option<Arc<Mutex<SessionInner>>> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn get_session_by_carrier_call_id(&self, carrier_call_id: &str) -> Option<String> {
        self.carrier_index.read().get(carrier_call_id).cloned()
    }

    /// Idempotent; replaces a stale reverse-index entry if the carrier
    /// reassigns call ids across reconnects (spec.md §4.1).
    pub fn set_carrier_call_id(&self, session_id: &str, carrier_call_id: &str) {
        let Some(inner) = self.get_inner(session_id) else {
            return;
        };
        let mut guard = inner.lock();
        let previous = guard.session.carrier_call_id.replace(carrier_call_id.to_string());
        drop(guard);

        let mut index = self.carrier_index.write();
        if let Some(previous) = previous {
            if previous != carrier_call_id {
                index.remove(&previous);
            }
        }
        index.insert(carrier_call_id.to_string(), session_id.to_string());
    }

    /// `updateStatus` — no-op on unknown/terminal sessions. Terminal
    /// transitions append `session.end` and record `endedAt`.
    pub fn update_status(
        &self,
        session_id: &str,
        status: CallStatus,
        reason: Option<String>,
    ) -> bool {
        let Some(inner) = self.get_inner(session_id) else {
            return false;
        };
        let mut guard = inner.lock();
        if guard.session.status.is_terminal() {
            return false;
        }
        let changed = guard.session.status != status;
        if !changed && reason.is_none() {
            return true;
        }

        let from = guard.session.status;
        guard.session.status = status;
        guard.append(EventKind::Status { status });
        TraceEvent::StatusChanged {
            session_id: session_id.to_string(),
            from: from.as_str().to_string(),
            to: status.as_str().to_string(),
            reason: reason.clone(),
        }
        .emit();

        if status.is_terminal() {
            guard.session.ended_at = Some(Utc::now());
            guard.session.terminal_reason = reason.clone();
            guard.append(EventKind::SessionEnd { reason });
            drop(guard);
            self.schedule_viewer_drain(session_id, inner.clone());
        }
        true
    }

    /// Close every viewer subscriber a short grace period after a session
    /// reaches a terminal status (spec.md §4.1/§5), regardless of whether
    /// the transition came from the media bridge or the status callback.
    /// Falls back to an immediate drain when called outside a Tokio runtime
    /// (plain unit tests), since there's nothing to schedule the sleep on.
    fn schedule_viewer_drain(&self, session_id: &str, inner: Arc<Mutex<SessionInner>>) {
        let session_id = session_id.to_string();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            inner.lock().viewers.clear();
            return;
        };
        handle.spawn(async move {
            tokio::time::sleep(VIEWER_DRAIN_GRACE).await;
            inner.lock().viewers.clear();
            TraceEvent::ViewerDropped {
                session_id,
                subscriber_id: "*".to_string(),
                reason: "session terminal".into(),
            }
            .emit();
        });
    }

    /// `recordTranscriptOrder` — anchor `item_id` right after
    /// `previous_item_id` when present, else append. Ordering here is
    /// independent of the per-speaker transcript item text; it exists
    /// purely to let `(speaker, item_id)` items be displayed in the order
    /// the carrier/model actually committed them.
    pub fn record_transcript_order(
        &self,
        session_id: &str,
        speaker: Speaker,
        item_id: &str,
        previous_item_id: Option<&str>,
    ) {
        let Some(inner) = self.get_inner(session_id) else {
            return;
        };
        let mut guard = inner.lock();
        let key = (speaker, item_id.to_string());
        if guard.session.transcript_order.contains(&key) {
            return;
        }
        let insert_at = previous_item_id
            .and_then(|prev| {
                guard
                    .session
                    .transcript_order
                    .iter()
                    .position(|(s, id)| *s == speaker && id == prev)
            })
            .map(|pos| pos + 1)
            .unwrap_or(guard.session.transcript_order.len());
        guard.session.transcript_order.insert(insert_at, key);
        renumber_order(&mut guard.session);
    }

    /// `appendTranscriptDelta` — upsert, concatenate, emit `transcript.delta`.
    pub fn append_transcript_delta(
        &self,
        session_id: &str,
        speaker: Speaker,
        item_id: &str,
        text_delta: &str,
        previous_item_id: Option<&str>,
    ) {
        let Some(inner) = self.get_inner(session_id) else {
            return;
        };
        let mut guard = inner.lock();
        if guard.session.status.is_terminal() {
            return;
        }
        let key = (speaker, item_id.to_string());
        if !guard.session.transcript_order.contains(&key) {
            let insert_at = previous_item_id
                .and_then(|prev| {
                    guard
                        .session
                        .transcript_order
                        .iter()
                        .position(|(s, id)| *s == speaker && id == prev)
                })
                .map(|pos| pos + 1)
                .unwrap_or(guard.session.transcript_order.len());
            guard.session.transcript_order.insert(insert_at, key.clone());
            renumber_order(&mut guard.session);
        }
        let order = guard
            .session
            .transcript_order
            .iter()
            .position(|k| *k == key)
            .unwrap_or(0);
        let seq_next = guard.session.next_seq;

        let item = guard
            .session
            .transcript_items
            .entry(key)
            .or_insert_with(|| TranscriptItem {
                item_id: item_id.to_string(),
                speaker,
                text: String::new(),
                is_final: false,
                seq: seq_next,
                order,
                timestamp: Utc::now(),
            });
        item.text.push_str(text_delta);
        item.is_final = false;
        item.order = order;
        item.timestamp = Utc::now();

        TraceEvent::TranscriptDelta {
            session_id: session_id.to_string(),
            item_id: item_id.to_string(),
            speaker: speaker.as_str().to_string(),
        }
        .emit();

        let event = guard.append(EventKind::TranscriptDelta {
            item_id: item_id.to_string(),
            speaker,
            text_delta: text_delta.to_string(),
            order,
        });
        if let Some(item) = guard
            .session
            .transcript_items
            .get_mut(&(speaker, item_id.to_string()))
        {
            item.seq = event.seq;
        }
    }

    /// `appendTranscriptFinal` — replace text, set `isFinal=true` (sticky:
    /// a later delta for the same item never flips it back to `false`
    /// unless a *new* final supersedes it, per spec.md §8 invariant).
    pub fn append_transcript_final(
        &self,
        session_id: &str,
        speaker: Speaker,
        item_id: &str,
        full_text: &str,
        previous_item_id: Option<&str>,
    ) {
        let Some(inner) = self.get_inner(session_id) else {
            return;
        };
        let mut guard = inner.lock();
        if guard.session.status.is_terminal() {
            return;
        }
        let key = (speaker, item_id.to_string());
        if !guard.session.transcript_order.contains(&key) {
            let insert_at = previous_item_id
                .and_then(|prev| {
                    guard
                        .session
                        .transcript_order
                        .iter()
                        .position(|(s, id)| *s == speaker && id == prev)
                })
                .map(|pos| pos + 1)
                .unwrap_or(guard.session.transcript_order.len());
            guard.session.transcript_order.insert(insert_at, key.clone());
            renumber_order(&mut guard.session);
        }
        let order = guard
            .session
            .transcript_order
            .iter()
            .position(|k| *k == key)
            .unwrap_or(0);
        let seq_next = guard.session.next_seq;

        let item = guard
            .session
            .transcript_items
            .entry(key.clone())
            .or_insert_with(|| TranscriptItem {
                item_id: item_id.to_string(),
                speaker,
                text: String::new(),
                is_final: false,
                seq: seq_next,
                order,
                timestamp: Utc::now(),
            });
        item.text = full_text.to_string();
        item.is_final = true;
        item.order = order;
        item.timestamp = Utc::now();

        TraceEvent::TranscriptFinal {
            session_id: session_id.to_string(),
            item_id: item_id.to_string(),
            speaker: speaker.as_str().to_string(),
            chars: full_text.len(),
        }
        .emit();

        let event = guard.append(EventKind::TranscriptFinal {
            item_id: item_id.to_string(),
            speaker,
            full_text: full_text.to_string(),
            order,
        });
        if let Some(item) = guard.session.transcript_items.get_mut(&key) {
            item.seq = event.seq;
        }
    }

    /// `appendAudioLevel` — clamp to `[0,1]`, emit `audio.level`.
    pub fn append_audio_level(&self, session_id: &str, speaker: Speaker, level: f32) {
        let Some(inner) = self.get_inner(session_id) else {
            return;
        };
        let mut guard = inner.lock();
        if guard.session.status.is_terminal() {
            return;
        }
        let clamped = level.clamp(0.0, 1.0);
        guard.append(EventKind::AudioLevel {
            speaker,
            level: clamped,
        });
    }

    /// `listEventsSince` — events with `seq > since_seq`, in order.
    pub fn list_events_since(&self, session_id: &str, since_seq: u64) -> Vec<Event> {
        let Some(inner) = self.get_inner(session_id) else {
            return Vec::new();
        };
        let events = inner.lock().events_since(since_seq);
        events
    }

    /// `subscribe` — register a viewer; returns `(subscriber_id, catch_up,
    /// rx)` or `None` when the session is unknown. Catch-up is captured
    /// under the same lock the viewer is registered under, so no event can
    /// be delivered twice or missed between catch-up and live (spec.md §5).
    pub fn subscribe(
        &self,
        session_id: &str,
        since_seq: u64,
    ) -> Option<(String, Vec<Event>, mpsc::Receiver<Event>)> {
        let inner = self.get_inner(session_id)?;
        let mut guard = inner.lock();
        let subscriber_id = Uuid::new_v4().to_string();
        let catch_up = guard.events_since(since_seq);
        let (tx, rx) = mpsc::channel(VIEWER_CHANNEL_DEPTH);
        guard.viewers.insert(subscriber_id.clone(), Viewer { tx });
        TraceEvent::ViewerSubscribed {
            session_id: session_id.to_string(),
            subscriber_id: subscriber_id.clone(),
            since_seq,
        }
        .emit();
        Some((subscriber_id, catch_up, rx))
    }

    pub fn unsubscribe(&self, session_id: &str, subscriber_id: &str) {
        if let Some(inner) = self.get_inner(session_id) {
            inner.lock().viewers.remove(subscriber_id);
        }
    }

    pub fn is_terminal(&self, session_id: &str) -> bool {
        self.get_inner(session_id)
            .map(|inner| inner.lock().session.status.is_terminal())
            .unwrap_or(true)
    }

    /// Close every viewer subscriber for a session (terminal drain,
    /// spec.md §4.1 "schedules viewer drain"). Dropping the sender side of
    /// the channel causes the fan-out task's `recv()` to return `None`.
    pub fn drain_viewers(&self, session_id: &str) {
        if let Some(inner) = self.get_inner(session_id) {
            inner.lock().viewers.clear();
        }
    }

    /// `getSummary` — status, times, last seq, transcript sorted by
    /// `(order, seq)`.
    pub fn get_summary(&self, session_id: &str) -> Option<StatusSummary> {
        let inner = self.get_inner(session_id)?;
        let guard = inner.lock();
        let mut transcript: Vec<TranscriptItem> =
            guard.session.transcript_items.values().cloned().collect();
        transcript.sort_by_key(|t| (t.order, t.seq));
        Some(StatusSummary {
            session_id: guard.session.session_id.clone(),
            status: guard.session.status,
            started_at: guard.session.started_at,
            ended_at: guard.session.ended_at,
            terminal_reason: guard.session.terminal_reason.clone(),
            last_seq: guard.event_log.back().map(|e| e.seq).unwrap_or(0),
            transcript,
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn call_brief(&self, session_id: &str) -> Option<CallBrief> {
        let inner = self.get_inner(session_id)?;
        let brief = inner.lock().session.call_brief.clone();
        brief
    }

    pub fn status(&self, session_id: &str) -> Option<CallStatus> {
        let inner = self.get_inner(session_id)?;
        let status = inner.lock().session.status;
        Some(status)
    }
}

/// Recompute `TranscriptItem::order` from `transcript_order` positions
/// after an insertion shifts later items.
fn renumber_order(session: &mut CallSession) {
    for (idx, key) in session.transcript_order.iter().enumerate() {
        if let Some(item) = session.transcript_items.get_mut(key) {
            item.order = idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_emits_initial_status() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        let events = store.list_events_since(&id, 0);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::Status {
                status: CallStatus::Queued
            }
        ));
    }

    #[test]
    fn seq_is_strictly_monotonic() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.update_status(&id, CallStatus::Ringing, None);
        store.append_audio_level(&id, Speaker::Recipient, 0.5);
        let events = store.list_events_since(&id, 0);
        for w in events.windows(2) {
            assert!(w[0].seq < w[1].seq);
        }
    }

    #[test]
    fn terminal_status_is_sticky() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.update_status(&id, CallStatus::Completed, Some("done".into()));
        assert!(!store.update_status(&id, CallStatus::Failed, Some("late".into())));
        assert_eq!(store.status(&id), Some(CallStatus::Completed));
    }

    #[test]
    fn no_event_appended_after_terminal_except_session_end() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.update_status(&id, CallStatus::Completed, Some("done".into()));
        let before = store.list_events_since(&id, 0).len();
        store.append_audio_level(&id, Speaker::Recipient, 0.5);
        store.append_transcript_delta(&id, Speaker::Recipient, "r1", "hi", None);
        let after = store.list_events_since(&id, 0).len();
        assert_eq!(before, after);
    }

    #[test]
    fn delta_then_final_replaces_text_and_is_final_sticks() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.append_transcript_delta(&id, Speaker::Recipient, "r1", "Hel", None);
        store.append_transcript_delta(&id, Speaker::Recipient, "r1", "lo", None);
        store.append_transcript_final(&id, Speaker::Recipient, "r1", "Hello there", None);
        let summary = store.get_summary(&id).unwrap();
        let item = &summary.transcript[0];
        assert_eq!(item.text, "Hello there");
        assert!(item.is_final);
    }

    #[test]
    fn audio_level_is_clamped() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.append_audio_level(&id, Speaker::Recipient, 5.0);
        store.append_audio_level(&id, Speaker::Recipient, -3.0);
        let events = store.list_events_since(&id, 0);
        for e in &events {
            if let EventKind::AudioLevel { level, .. } = e.kind {
                assert!((0.0..=1.0).contains(&level));
            }
        }
    }

    #[test]
    fn event_log_eviction_is_fifo() {
        let store = SessionStore::new(3);
        let id = store.create_session(None);
        for i in 0..10 {
            store.append_audio_level(&id, Speaker::Recipient, i as f32 * 0.1);
        }
        let events = store.list_events_since(&id, 0);
        assert_eq!(events.len(), 3);
        // seq values are monotonic and don't restart after eviction.
        assert!(events[0].seq > 0);
    }

    #[test]
    fn viewer_receives_only_events_after_since_seq() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None); // seq 1
        store.update_status(&id, CallStatus::Ringing, None); // seq 2
        store.update_status(&id, CallStatus::InProgress, None); // seq 3
        let (_sub, catch_up, _rx) = store.subscribe(&id, 2).unwrap();
        assert_eq!(catch_up.len(), 1);
        assert_eq!(catch_up[0].seq, 3);
    }

    #[tokio::test]
    async fn subscribe_then_live_events_arrive_in_order() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        let (_sub, _catch_up, mut rx) = store.subscribe(&id, 0).unwrap();
        store.update_status(&id, CallStatus::Ringing, None);
        store.update_status(&id, CallStatus::InProgress, None);
        let e1 = rx.recv().await.unwrap();
        let e2 = rx.recv().await.unwrap();
        assert!(e1.seq < e2.seq);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_drains_viewers_after_grace_period() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        let (_sub, _catch_up, mut rx) = store.subscribe(&id, 0).unwrap();

        store.update_status(&id, CallStatus::Completed, Some("carrier stop".into()));

        // Drain the status-change and session-end events sent before the drain fires.
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        tokio::time::advance(VIEWER_DRAIN_GRACE + std::time::Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert!(rx.recv().await.is_none(), "viewer channel should close once drained");
    }

    #[test]
    fn unknown_session_returns_none_or_empty() {
        let store = SessionStore::new(5000);
        assert!(store.subscribe("nope", 0).is_none());
        assert_eq!(store.list_events_since("nope", 0).len(), 0);
        assert!(store.get_summary("nope").is_none());
    }

    #[test]
    fn carrier_call_id_reverse_index() {
        let store = SessionStore::new(5000);
        let id = store.create_session(None);
        store.set_carrier_call_id(&id, "CA123");
        assert_eq!(
            store.get_session_by_carrier_call_id("CA123"),
            Some(id.clone())
        );
        // Idempotent re-set with a different id moves the index.
        store.set_carrier_call_id(&id, "CA456");
        assert_eq!(store.get_session_by_carrier_call_id("CA123"), None);
        assert_eq!(store.get_session_by_carrier_call_id("CA456"), Some(id));
    }
}
