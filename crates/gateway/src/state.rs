//! Shared application state passed to every API handler (teacher's
//! `sa_gateway::state::AppState` grouped-by-concern shape).

use std::sync::Arc;
use std::time::Instant;

use call_bridge::BridgeDeps;
use call_domain::config::Config;
use call_session_core::{SessionStore, ViewerTokenService};
use call_summary::SummarySynthesizer;

#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Session management ──────────────────────────────────────────
    pub store: Arc<SessionStore>,
    pub tokens: Arc<ViewerTokenService>,

    // ── Media bridge ─────────────────────────────────────────────────
    pub bridge_deps: BridgeDeps,

    // ── Summaries ─────────────────────────────────────────────────────
    pub summary: Arc<SummarySynthesizer>,

    // ── Static assets ─────────────────────────────────────────────────
    /// Directory widget HTML/JS/CSS assets are read from on every request
    /// (spec.md §4.7 "re-read from disk on each fetch").
    pub assets_dir: std::path::PathBuf,

    // ── Observability ───────────────────────────────────────────────────
    pub started_at: Instant,
}
