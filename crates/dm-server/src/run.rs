//! Drives one `/dashboards/process` request (or the `process` CLI
//! subcommand) through extraction, merge, and knowledge-base build,
//! reusing the same `dm-pipeline`/`dm-merge`/`dm-kb` entry points either
//! way.

use std::collections::HashMap;
use std::sync::Arc;

use dm_merge::MergeSource;
use dm_model::{KbBuildStatus, OverallStatus};
use dm_pipeline::{run_all, DashboardMode, Dependencies, OrchestratorConfig};
use tracing::{error, info, warn};

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub dashboard_ids: Vec<i64>,
    pub extract: bool,
    pub merge: bool,
    pub build_kb: bool,
    pub modes: HashMap<i64, DashboardMode>,
}

/// Outcome of a full run, used by the CLI to pick an exit code: 0
/// success, 1 usage, 2 upstream-auth failure, 3 partial, 4 total failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    AllSucceeded,
    AuthFailure,
    Partial,
    TotalFailure,
}

pub async fn run(state: Arc<AppState>, request: ProcessRequest) -> RunOutcome {
    let mut outcome = RunOutcome::AllSucceeded;

    if request.extract {
        outcome = run_extraction(&state, &request).await;
    }

    if matches!(outcome, RunOutcome::AuthFailure) {
        state.run_lock.release();
        return outcome;
    }

    if request.merge {
        run_merge(&state, &request.dashboard_ids).await;
    }

    if request.build_kb {
        run_kb_build(&state).await;
    }

    state
        .progress
        .update_overall(OverallStatus::Completed, Some("run finished".to_string()))
        .ok();
    state.run_lock.release();
    outcome
}

async fn run_extraction(state: &Arc<AppState>, request: &ProcessRequest) -> RunOutcome {
    let deps = Dependencies {
        dashboard_transport: state.dashboard_transport.clone(),
        schema_transport: state.schema_transport.clone(),
        gateway: state.gateway.clone(),
        config: state.pipeline_config.clone(),
        validator_config: state.validator_config.clone(),
        progress: state.progress.clone(),
        cancellation: state.cancellation.clone(),
    };
    let orchestrator_config =
        OrchestratorConfig { max_workers_dashboards: state.max_workers_dashboards, continue_on_error: true };

    let mut fresh_ids = Vec::new();
    let mut existing_ids = Vec::new();
    for &id in &request.dashboard_ids {
        match request.modes.get(&id).copied().unwrap_or(DashboardMode::Fresh) {
            DashboardMode::Fresh => fresh_ids.push(id),
            DashboardMode::UseExisting => existing_ids.push(id),
        }
    }

    let mut outcomes = Vec::new();
    if !fresh_ids.is_empty() {
        outcomes.extend(run_all(&deps, orchestrator_config, fresh_ids, DashboardMode::Fresh).await);
    }
    if !existing_ids.is_empty() && !state.cancellation.is_cancelled() {
        outcomes.extend(run_all(&deps, orchestrator_config, existing_ids, DashboardMode::UseExisting).await);
    }

    let total = outcomes.len();
    let failed = outcomes.iter().filter(|outcome| outcome.result.is_err()).count();
    // `run_all` only cancels on a run-fatal error (see `orchestrator::run_all`), and
    // `continue_on_error` is always `true` here, so cancellation already means auth-fatal.
    if state.cancellation.is_cancelled() {
        error!("dm-server: run-fatal upstream auth failure, aborting before merge");
        return RunOutcome::AuthFailure;
    }
    if failed == 0 {
        RunOutcome::AllSucceeded
    } else if failed < total {
        RunOutcome::Partial
    } else {
        RunOutcome::TotalFailure
    }
}

async fn run_merge(state: &Arc<AppState>, dashboard_ids: &[i64]) {
    let sources = dashboard_ids
        .iter()
        .map(|&dashboard_id| MergeSource { dashboard_id, dir: state.pipeline_config.dashboard_dir(dashboard_id) })
        .filter(|source| source.dir.exists())
        .collect::<Vec<_>>();

    if sources.is_empty() {
        warn!("dm-server: no dashboard artifacts available to merge, skipping");
        return;
    }

    let merged_dir = state.pipeline_config.merged_dir();
    let include_existing_merged = merged_dir.join("merged_metadata.json").exists();
    match dm_merge::run(&state.gateway, &state.progress, &sources, &merged_dir, include_existing_merged).await {
        Ok(output) => {
            info!(
                conflicts = output.conflicts.len(),
                tables = output.metadata.tables.len(),
                "dm-server: merge completed"
            );
        }
        Err(error) => error!(error = %error, "dm-server: merge failed"),
    }
}

async fn run_kb_build(state: &Arc<AppState>) {
    state.progress.update_kb_build(KbBuildStatus::Building).ok();
    let merged_dir = state.pipeline_config.merged_dir();
    let output_path = merged_dir.join("knowledge_base.zip");
    match dm_kb::build(&merged_dir, &output_path) {
        Ok(()) => {
            state.progress.update_kb_build(KbBuildStatus::Completed).ok();
        }
        Err(error) => {
            error!(error = %error, "dm-server: knowledge-base build failed");
            state.progress.update_kb_build(KbBuildStatus::Failed).ok();
        }
    }
}
