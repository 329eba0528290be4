//! Startup wiring (spec.md §6 environment variables; teacher's
//! `main.rs::run_server` "read once at init" shape, condensed to this
//! server's much smaller set of shared services).

use std::sync::Arc;

use call_bridge::BridgeDeps;
use call_domain::config::Config;
use call_session_core::{SessionStore, ViewerTokenService};
use call_summary::SummarySynthesizer;

use crate::state::AppState;

pub fn build_app_state(config: Arc<Config>) -> AppState {
    let store = Arc::new(SessionStore::new(config.server.event_log_cap));
    let tokens = Arc::new(ViewerTokenService::new(config.viewer_auth.secret.clone()));
    let bridge_deps = BridgeDeps {
        store: store.clone(),
        config: config.clone(),
    };
    let summary = Arc::new(SummarySynthesizer::new(
        store.clone(),
        config.model.clone(),
        config.call_brief.parent_name.clone(),
    ));
    let assets_dir = std::env::var("CALL_ASSETS_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("assets"));

    AppState {
        config,
        store,
        tokens,
        bridge_deps,
        summary,
        assets_dir,
        started_at: std::time::Instant::now(),
    }
}
