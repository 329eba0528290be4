//! Realtime-session instruction prompt rendering (spec.md §4.3, §9).
//!
//! Call-brief fields are interpolated into a `{{name}}`-templated string.
//! Missing fields resolve to safe defaults; a missing template file never
//! fails the bridge, it falls back to an in-code string (spec.md §9).

use crate::config::CallBriefDefaults;
use crate::model::CallBrief;

const FALLBACK_TEMPLATE: &str = "You are {{teacher_role}} calling on behalf of {{school_name}} \
to speak with {{parent_name}} ({{parent_relationship}}) about {{student_name}}. \
Reason for this call: {{reason_summary}}. Additional context: {{context_from_chat}}. \
Recent absence record: {{absence_stats}}. Be warm, concise, and respectful of the \
recipient's time. Confirm you are speaking with the right person before discussing \
any student-specific information.";

/// Render the instructions sent in the realtime session-configure message.
/// Reads `template_path` from disk if set; any read failure is silently
/// absorbed and the in-code fallback is used instead.
pub fn render(
    template_path: Option<&str>,
    system_prompt_fallback: Option<&str>,
    brief: Option<&CallBrief>,
    defaults: &CallBriefDefaults,
) -> String {
    let template = template_path
        .and_then(|p| std::fs::read_to_string(p).ok())
        .or_else(|| system_prompt_fallback.map(str::to_string))
        .unwrap_or_else(|| FALLBACK_TEMPLATE.to_string());

    let brief = brief.cloned().unwrap_or_default();
    let vars: [(&str, String); 6] = [
        ("student_name", defaults.student_name.clone()),
        ("parent_name", defaults.parent_name.clone()),
        ("parent_relationship", defaults.parent_relationship.clone()),
        ("school_name", defaults.school_name.clone()),
        ("teacher_role", defaults.teacher_role.clone()),
        (
            "reason_summary",
            brief
                .reason_summary
                .clone()
                .unwrap_or_else(|| "not specified".to_string()),
        ),
    ];

    let mut rendered = template;
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), &value);
    }
    rendered = rendered.replace(
        "{{context_from_chat}}",
        brief
            .context_from_chat
            .as_deref()
            .unwrap_or("none provided"),
    );
    rendered = rendered.replace(
        "{{absence_stats}}",
        brief.absence_stats.as_deref().unwrap_or("not available"),
    );
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_safe_defaults() {
        let defaults = CallBriefDefaults::default();
        let rendered = render(None, None, None, &defaults);
        assert!(rendered.contains("not specified"));
        assert!(rendered.contains("none provided"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn brief_fields_are_interpolated() {
        let defaults = CallBriefDefaults::default();
        let brief = CallBrief {
            reason_summary: Some("Absent 3 days this week".into()),
            context_from_chat: Some("Parent requested callback".into()),
            absence_stats: Some("3 of 5 school days".into()),
        };
        let rendered = render(None, None, Some(&brief), &defaults);
        assert!(rendered.contains("Absent 3 days this week"));
        assert!(rendered.contains("Parent requested callback"));
        assert!(rendered.contains("3 of 5 school days"));
    }
}
