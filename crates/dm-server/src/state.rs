//! Shared process state handed to every handler: the same transports,
//! gateway, config and progress tracker the CLI `process` subcommand uses,
//! plus a run lock so two overlapping `POST /dashboards/process` calls
//! don't race each other's background run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dm_core::CancellationToken;
use dm_dashboard_source::DashboardSourceTransport;
use dm_llm::LlmGatewayHandle;
use dm_pipeline::PipelineConfig;
use dm_progress::ProgressTracker;
use dm_schema_source::SchemaSourceTransport;
use dm_validator::TableValidatorConfig;

/// A single-slot run lock: `try_acquire` flips the flag if and only if it
/// was clear, so two overlapping `POST /dashboards/process` calls can't
/// both start a background run. The background task releases it on exit.
#[derive(Default)]
pub struct RunLock {
    running: AtomicBool,
}

impl RunLock {
    pub fn try_acquire(&self) -> bool {
        self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    pub fn release(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct AppState {
    pub dashboard_transport: DashboardSourceTransport,
    pub schema_transport: SchemaSourceTransport,
    pub gateway: LlmGatewayHandle,
    pub pipeline_config: PipelineConfig,
    pub validator_config: TableValidatorConfig,
    pub max_workers_dashboards: usize,
    pub progress: ProgressTracker,
    pub cancellation: CancellationToken,
    pub run_lock: RunLock,
}

pub type SharedState = Arc<AppState>;
