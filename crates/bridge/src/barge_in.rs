//! Barge-in decision logic (spec.md §4.3 "Barge-in (playback interruption)").
//! Pure and IO-free so the documented dedup property (spec.md §8 scenario D)
//! is directly testable: tracking state lives in [`PlaybackState`], actions
//! to perform live in [`BargeInAction`].

#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub response_id: Option<String>,
    pub item_id: Option<String>,
    pub content_index: u32,
    /// Cumulative milliseconds of assistant audio sent for the active item.
    pub sent_ms: u64,
    pub playback_started_at: Option<std::time::Instant>,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        self.response_id.is_some() || self.item_id.is_some()
    }

    pub fn clear(&mut self) {
        *self = PlaybackState::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BargeInAction {
    CarrierClear,
    ModelResponseCancel {
        event_id: String,
    },
    ModelItemTruncate {
        event_id: String,
        item_id: String,
        content_index: u32,
        audio_end_ms: u32,
    },
}

/// Decide what to send in response to a model `input_audio_buffer.speech_started`
/// event, given the current playback state and wall-clock milliseconds
/// elapsed since `playback_started_at`. Does not mutate `state`; the caller
/// clears it after dispatching the returned actions (spec.md §4.3 step 4).
pub fn plan_barge_in(
    state: &PlaybackState,
    elapsed_ms: u64,
    mut event_id_factory: impl FnMut() -> String,
) -> Vec<BargeInAction> {
    if !state.is_active() {
        return Vec::new();
    }

    let mut actions = vec![BargeInAction::CarrierClear];

    if let Some(response_id) = &state.response_id {
        let _ = response_id;
        actions.push(BargeInAction::ModelResponseCancel {
            event_id: event_id_factory(),
        });
    }

    if let Some(item_id) = &state.item_id {
        if state.sent_ms > 0 {
            let audio_end_ms = state.sent_ms.min(elapsed_ms) as u32;
            actions.push(BargeInAction::ModelItemTruncate {
                event_id: event_id_factory(),
                item_id: item_id.clone(),
                content_index: state.content_index,
                audio_end_ms,
            });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_factory(counter: std::rc::Rc<std::cell::Cell<u32>>) -> impl FnMut() -> String {
        move || {
            let n = counter.get();
            counter.set(n + 1);
            format!("evt-{n}")
        }
    }

    #[test]
    fn no_active_playback_is_a_no_op() {
        let state = PlaybackState::default();
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let actions = plan_barge_in(&state, 500, counting_factory(counter));
        assert!(actions.is_empty());
    }

    #[test]
    fn active_response_and_item_produce_clear_cancel_truncate() {
        let state = PlaybackState {
            response_id: Some("resp-1".into()),
            item_id: Some("item-1".into()),
            content_index: 0,
            sent_ms: 160,
            playback_started_at: Some(std::time::Instant::now()),
        };
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let actions = plan_barge_in(&state, 200, counting_factory(counter));
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], BargeInAction::CarrierClear);
        assert!(matches!(actions[1], BargeInAction::ModelResponseCancel { .. }));
        match &actions[2] {
            BargeInAction::ModelItemTruncate { audio_end_ms, item_id, .. } => {
                assert_eq!(*audio_end_ms, 160);
                assert_eq!(item_id, "item-1");
            }
            other => panic!("expected truncate, got {other:?}"),
        }
    }

    #[test]
    fn audio_end_ms_is_capped_by_elapsed_wall_clock() {
        let state = PlaybackState {
            response_id: None,
            item_id: Some("item-1".into()),
            content_index: 0,
            sent_ms: 500,
            playback_started_at: Some(std::time::Instant::now()),
        };
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let actions = plan_barge_in(&state, 120, counting_factory(counter));
        match &actions[1] {
            BargeInAction::ModelItemTruncate { audio_end_ms, .. } => assert_eq!(*audio_end_ms, 120),
            other => panic!("expected truncate, got {other:?}"),
        }
    }

    #[test]
    fn back_to_back_speech_started_is_a_no_op_the_second_time() {
        let mut state = PlaybackState {
            response_id: Some("resp-1".into()),
            item_id: Some("item-1".into()),
            content_index: 0,
            sent_ms: 160,
            playback_started_at: Some(std::time::Instant::now()),
        };
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let first = plan_barge_in(&state, 200, counting_factory(counter.clone()));
        assert_eq!(first.len(), 3);
        state.clear();
        let second = plan_barge_in(&state, 200, counting_factory(counter));
        assert!(second.is_empty());
    }

    #[test]
    fn item_without_sent_audio_skips_truncate() {
        let state = PlaybackState {
            response_id: Some("resp-1".into()),
            item_id: Some("item-1".into()),
            content_index: 0,
            sent_ms: 0,
            playback_started_at: Some(std::time::Instant::now()),
        };
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let actions = plan_barge_in(&state, 50, counting_factory(counter));
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[1], BargeInAction::ModelResponseCancel { .. }));
    }
}
