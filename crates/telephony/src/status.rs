//! Carrier status string → [`CallStatus`] mapping (spec.md §4.4 "Carrier
//! status mapping (canonical)").

use call_domain::model::CallStatus;

pub fn map_carrier_status(raw: &str) -> CallStatus {
    match raw.to_ascii_lowercase().as_str() {
        "ringing" => CallStatus::Ringing,
        "in-progress" | "answered" => CallStatus::InProgress,
        "queued" | "initiated" | "scheduled" => CallStatus::Queued,
        "completed" => CallStatus::Completed,
        _ => CallStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_mappings() {
        assert_eq!(map_carrier_status("ringing"), CallStatus::Ringing);
        assert_eq!(map_carrier_status("in-progress"), CallStatus::InProgress);
        assert_eq!(map_carrier_status("answered"), CallStatus::InProgress);
        assert_eq!(map_carrier_status("queued"), CallStatus::Queued);
        assert_eq!(map_carrier_status("initiated"), CallStatus::Queued);
        assert_eq!(map_carrier_status("scheduled"), CallStatus::Queued);
        assert_eq!(map_carrier_status("completed"), CallStatus::Completed);
    }

    #[test]
    fn unknown_strings_map_to_failed() {
        assert_eq!(map_carrier_status("busy"), CallStatus::Failed);
        assert_eq!(map_carrier_status("no-answer"), CallStatus::Failed);
        assert_eq!(map_carrier_status(""), CallStatus::Failed);
    }
}
