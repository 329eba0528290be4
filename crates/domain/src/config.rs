//! Process configuration, loaded once at startup from the environment.
//!
//! Mirrors the teacher's one-struct-per-concern shape even though the
//! source here is `std::env` rather than a TOML file: each sub-config is
//! `Default` + `Serialize`/`Deserialize` so it can be dumped for
//! diagnostics (`GET /healthz`) the same way the teacher dumps `Config`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub twilio: TwilioConfig,
    pub model: ModelConfig,
    pub viewer_auth: ViewerAuthConfig,
    pub call_brief: CallBriefDefaults,
}

impl Config {
    /// Read every recognized environment variable (spec.md §6) into a
    /// `Config`. Missing values fall back to documented defaults; missing
    /// *required* values (e.g. Twilio credentials) are left `None` and
    /// surfaced as configuration errors at the call sites that need them,
    /// not at startup — the server must still boot without telephony
    /// credentials configured (spec.md §7, Configuration errors).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            twilio: TwilioConfig::from_env(),
            model: ModelConfig::from_env(),
            viewer_auth: ViewerAuthConfig::from_env(),
            call_brief: CallBriefDefaults::from_env(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable base URL; drives TwiML `<Stream>` URLs,
    /// status-callback URLs, and the `logsWsUrl` returned to widgets.
    pub public_url: String,
    /// Event log cap per session (spec.md §3, default 5000).
    pub event_log_cap: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            public_url: "http://localhost:8000".into(),
            event_log_cap: 5000,
        }
    }
}

impl ServerConfig {
    fn from_env() -> Self {
        let port = env_opt("PORT")
            .or_else(|| env_opt("MCP_PORT"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);
        Self {
            port,
            public_url: env_or("PUBLIC_URL", "http://localhost:8000"),
            event_log_cap: 5000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telephony (Twilio-shaped carrier)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub to_number_default: Option<String>,
}

impl TwilioConfig {
    fn from_env() -> Self {
        Self {
            account_sid: env_opt("TWILIO_ACCOUNT_SID"),
            auth_token: env_opt("TWILIO_AUTH_TOKEN"),
            from_number: env_opt("TWILIO_FROM_NUMBER"),
            to_number_default: env_opt("TWILIO_TO_NUMBER_DEFAULT"),
        }
    }

    /// Whether enough credentials exist to place an outbound call.
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Realtime + summary model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub realtime_transcription_model: String,
    pub summary_model: String,
    pub prompt_template_path: Option<String>,
    pub system_prompt_fallback: Option<String>,
}

impl ModelConfig {
    fn from_env() -> Self {
        Self {
            api_key: env_opt("OPENAI_API_KEY"),
            realtime_model: env_or("OPENAI_REALTIME_MODEL", "gpt-realtime"),
            realtime_voice: env_or("OPENAI_REALTIME_VOICE", "alloy"),
            realtime_transcription_model: env_or(
                "OPENAI_REALTIME_TRANSCRIPTION_MODEL",
                "whisper-1",
            ),
            summary_model: env_or("OPENAI_SUMMARY_MODEL", "gpt-4o-mini"),
            prompt_template_path: env_opt("OPENAI_REALTIME_PROMPT_TEMPLATE"),
            system_prompt_fallback: env_opt("OPENAI_REALTIME_SYSTEM_PROMPT"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Viewer auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerAuthConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    pub ttl_secs: u64,
}

impl ViewerAuthConfig {
    fn from_env() -> Self {
        // Fallback chain per spec.md §6: a dedicated secret, then other
        // secret-shaped variables already present in the environment, then
        // an insecure literal as a last resort (dev mode only).
        let secret = env_opt("CALL_VIEWER_TOKEN_SECRET")
            .or_else(|| env_opt("TWILIO_AUTH_TOKEN"))
            .or_else(|| env_opt("OPENAI_API_KEY"))
            .unwrap_or_else(|| "insecure-dev-viewer-secret".to_string());
        Self {
            secret,
            ttl_secs: 600,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call-brief defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallBriefDefaults {
    pub student_name: String,
    pub parent_name: String,
    pub parent_relationship: String,
    pub parent_number_label: String,
    pub school_name: String,
    pub teacher_role: String,
}

impl Default for CallBriefDefaults {
    fn default() -> Self {
        Self {
            student_name: "the student".into(),
            parent_name: "there".into(),
            parent_relationship: "parent/guardian".into(),
            parent_number_label: "home".into(),
            school_name: "the school".into(),
            teacher_role: "attendance assistant".into(),
        }
    }
}

impl CallBriefDefaults {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            student_name: env_or("CALL_STUDENT_NAME", &d.student_name),
            parent_name: env_or("CALL_PARENT_NAME", &d.parent_name),
            parent_relationship: env_or("CALL_PARENT_RELATIONSHIP", &d.parent_relationship),
            parent_number_label: env_or("CALL_PARENT_NUMBER_LABEL", &d.parent_number_label),
            school_name: env_or("CALL_SCHOOL_NAME", &d.school_name),
            teacher_role: env_or("CALL_TEACHER_ROLE", &d.teacher_role),
        }
    }
}
