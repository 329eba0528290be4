//! Call-control document generation (spec.md §4.4, §4.7 glossary
//! "Call-control document"). No XML crate in the dependency table — same
//! preference for a plain formatted string the teacher shows in
//! `call_domain::prompt::render`.

/// Build the XML document instructing the carrier to open a bidirectional
/// media websocket at `<public_url>/twilio/call`, carrying `session_id` as
/// a custom parameter so the bridge can bind before `start` arrives.
pub fn render_call_control_document(public_url: &str, session_id: &str) -> String {
    let ws_url = format!(
        "{}/twilio/call",
        public_url.trim_end_matches('/').replacen("https://", "wss://", 1).replacen("http://", "ws://", 1)
    );
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="{ws_url}">
      <Parameter name="sessionId" value="{session_id}" />
    </Stream>
  </Connect>
</Response>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_scheme_to_websocket() {
        let doc = render_call_control_document("https://example.com", "sess-1");
        assert!(doc.contains("wss://example.com/twilio/call"));
        assert!(doc.contains(r#"value="sess-1""#));
    }

    #[test]
    fn plain_http_becomes_plain_ws() {
        let doc = render_call_control_document("http://localhost:8000", "sess-2");
        assert!(doc.contains("ws://localhost:8000/twilio/call"));
    }
}
