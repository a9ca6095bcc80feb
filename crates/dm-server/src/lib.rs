//! The REST façade: a thin, background-run-spawning wrapper over
//! `dm-pipeline`, `dm-merge`, and `dm-kb`, following the
//! `gateway_openresponses` bind/serve bootstrap shape.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod run;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dm_core::CancellationToken;
use dm_llm::{LlmGateway, LlmGatewayHandle};
use dm_progress::ProgressTracker;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::state::{AppState, RunLock};

/// Builds the shared process state from an `AppConfig`: opens the HTTP
/// transports, configures the process-wide LLM gateway, and loads (or
/// initializes) the progress tracker at `<base_dir>/progress.json`.
pub async fn build_state(config: AppConfig) -> Result<Arc<AppState>> {
    let dashboard_transport = dm_dashboard_source::DashboardSourceTransport::new(config.dashboard_source)
        .context("failed to build dashboard source transport")?;
    let schema_transport = dm_schema_source::SchemaSourceTransport::new(config.schema_source)
        .context("failed to build schema source transport")?;
    let gateway: LlmGatewayHandle = LlmGateway::configure(config.gateway).await.context("failed to configure LLM gateway")?;
    let progress = ProgressTracker::load_or_init(config.pipeline.progress_path())
        .context("failed to load or initialize progress tracker")?;

    Ok(Arc::new(AppState {
        dashboard_transport,
        schema_transport,
        gateway,
        pipeline_config: config.pipeline,
        validator_config: config.validator,
        max_workers_dashboards: config.max_workers_dashboards,
        progress,
        cancellation: CancellationToken::new(),
        run_lock: RunLock::default(),
    }))
}

/// Binds and serves the REST façade until ctrl-c, following
/// `run_gateway_openresponses_server`'s bootstrap shape.
pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> Result<()> {
    let addr = bind_addr.parse::<SocketAddr>().with_context(|| format!("invalid bind address '{bind_addr}'"))?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "dm-server listening");

    let app = router::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server exited unexpectedly")
}
