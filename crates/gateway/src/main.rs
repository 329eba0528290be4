//! Gateway binary: wires configuration, shared services, and the HTTP/WS
//! router together, then serves (teacher's `main.rs::run_server` shape,
//! condensed to this service's much smaller set of shared services).

mod api;
mod bootstrap;
mod state;
mod ws;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower::limit::ConcurrencyLimitLayer;
use tracing_subscriber::EnvFilter;

use call_domain::config::Config;

/// This service has exactly one run mode — no subcommands, unlike the
/// teacher's `doctor`/`config`-family CLI — so the surface here is just an
/// optional port override for local runs without touching `PORT`.
#[derive(Parser)]
#[command(version, about = "Call Session Core gateway")]
struct Cli {
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    run_server(Arc::new(config)).await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,call_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("call session core starting");

    let state = bootstrap::build_app_state(config.clone());
    tracing::info!(assets_dir = %state.assets_dir.display(), "app state ready");

    let max_concurrent = std::env::var("CALL_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);
    tracing::info!(max_concurrent, "concurrency limit set");

    let app = api::router()
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "call session core listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
