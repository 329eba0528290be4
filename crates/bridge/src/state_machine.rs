//! Bridge-local state machine (spec.md §4.3 "State machine (bridge local)").

use call_domain::model::CallStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    AwaitingStart,
    Bound,
    Active,
    Closing,
    Closed,
}

impl BridgeState {
    /// `awaiting-start → bound`: first carrier `start` mapped to a session.
    pub fn on_bound(self) -> Self {
        match self {
            BridgeState::AwaitingStart => BridgeState::Bound,
            other => other,
        }
    }

    /// `bound → active`: model socket open AND session status `in-progress`.
    pub fn on_model_ready(self, session_status: CallStatus) -> Self {
        match self {
            BridgeState::Bound if session_status == CallStatus::InProgress => BridgeState::Active,
            other => other,
        }
    }

    /// Either side's close/error, or carrier `stop`.
    pub fn on_close_or_error(self) -> Self {
        match self {
            BridgeState::Closed => BridgeState::Closed,
            _ => BridgeState::Closing,
        }
    }

    pub fn on_both_sockets_closed(self) -> Self {
        match self {
            BridgeState::Closing => BridgeState::Closed,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BridgeState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut s = BridgeState::AwaitingStart;
        s = s.on_bound();
        assert_eq!(s, BridgeState::Bound);
        s = s.on_model_ready(CallStatus::InProgress);
        assert_eq!(s, BridgeState::Active);
        s = s.on_close_or_error();
        assert_eq!(s, BridgeState::Closing);
        s = s.on_both_sockets_closed();
        assert_eq!(s, BridgeState::Closed);
    }

    #[test]
    fn model_ready_without_in_progress_status_stays_bound() {
        let s = BridgeState::Bound.on_model_ready(CallStatus::Queued);
        assert_eq!(s, BridgeState::Bound);
    }

    #[test]
    fn closed_is_sticky() {
        let s = BridgeState::Closed.on_close_or_error();
        assert_eq!(s, BridgeState::Closed);
        assert!(s.is_terminal());
    }

    #[test]
    fn on_bound_is_idempotent_past_awaiting_start() {
        let s = BridgeState::Active.on_bound();
        assert_eq!(s, BridgeState::Active);
    }
}
