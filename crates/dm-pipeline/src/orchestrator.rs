//! The orchestrator: runs many dashboards concurrently, bounded by
//! `max_workers_dashboards`, honoring `continue_on_error` and cooperative
//! cancellation, and driving the overall run status from `Extracting`
//! through to `Merging` (or straight to `Completed` if nothing succeeded).

use std::sync::Arc;

use dm_core::CancellationToken;
use dm_dashboard_source::DashboardSourceTransport;
use dm_llm::LlmGatewayHandle;
use dm_model::OverallStatus;
use dm_progress::ProgressTracker;
use dm_schema_source::SchemaSourceTransport;
use dm_validator::TableValidatorConfig;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::engine::{DashboardMode, PhaseEngine};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_workers_dashboards: usize,
    /// When false, a dashboard failure (other than a run-fatal one, which
    /// always stops the run) cancels the run after in-flight dashboards
    /// finish rather than queuing the rest.
    pub continue_on_error: bool,
}

#[derive(Debug)]
pub struct DashboardOutcome {
    pub dashboard_id: i64,
    pub result: Result<(), String>,
}

pub struct Dependencies {
    pub dashboard_transport: DashboardSourceTransport,
    pub schema_transport: SchemaSourceTransport,
    pub gateway: LlmGatewayHandle,
    pub config: PipelineConfig,
    pub validator_config: TableValidatorConfig,
    pub progress: ProgressTracker,
    pub cancellation: CancellationToken,
}

pub async fn run_all(
    deps: &Dependencies,
    orchestrator_config: OrchestratorConfig,
    dashboard_ids: Vec<i64>,
    mode: DashboardMode,
) -> Vec<DashboardOutcome> {
    deps.progress
        .update_overall(OverallStatus::Extracting, Some("extracting dashboards".to_string()))
        .ok();

    let semaphore = Arc::new(Semaphore::new(orchestrator_config.max_workers_dashboards.max(1)));
    let mut handles = Vec::with_capacity(dashboard_ids.len());

    for dashboard_id in dashboard_ids {
        if deps.cancellation.is_cancelled() {
            break;
        }

        let dashboard_transport = deps.dashboard_transport.clone();
        let schema_transport = deps.schema_transport.clone();
        let gateway = deps.gateway.clone();
        let config = deps.config.clone();
        let validator_config = deps.validator_config.clone();
        let progress = deps.progress.clone();
        let cancellation = deps.cancellation.clone();
        let semaphore = Arc::clone(&semaphore);
        let continue_on_error = orchestrator_config.continue_on_error;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let engine = PhaseEngine {
                dashboard_transport: &dashboard_transport,
                schema_transport: &schema_transport,
                gateway: &gateway,
                config: &config,
                validator_config: &validator_config,
                progress: &progress,
                cancellation: &cancellation,
            };
            let result = engine.run_dashboard(dashboard_id, mode).await;
            if let Err(error) = &result {
                if error.is_run_fatal() || !continue_on_error {
                    cancellation.cancel();
                }
            }
            DashboardOutcome { dashboard_id, result: result.map_err(|error| error.to_string()) }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => warn!(error = %error, "orchestrator: a dashboard worker task panicked"),
        }
    }

    let succeeded = outcomes.iter().filter(|outcome| outcome.result.is_ok()).count();
    if succeeded > 0 {
        deps.progress
            .update_overall(OverallStatus::Merging, Some("merging dashboard metadata".to_string()))
            .ok();
    } else {
        deps.progress
            .update_overall(OverallStatus::Completed, Some("no dashboard succeeded; nothing to merge".to_string()))
            .ok();
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{required_existing_artifacts, ExtractionStrategy};
    use dm_dashboard_source::DashboardSourceConfig;
    use dm_llm::{GatewayConfig, ProviderKind};
    use dm_schema_source::SchemaSourceConfig;

    fn standalone_gateway() -> LlmGatewayHandle {
        LlmGatewayHandle::new_standalone(GatewayConfig {
            provider: ProviderKind::ProviderA,
            model: "model-x".to_string(),
            base_url: "https://unused.example.com".to_string(),
            api_key: "test-key".to_string(),
            max_tokens: 256,
            temperature: 0.0,
            request_timeout_ms: 1_000,
            max_retries: 1,
        })
        .expect("standalone gateway")
    }

    fn dependencies(base_dir: std::path::PathBuf) -> Dependencies {
        let dashboard_transport = DashboardSourceTransport::new(DashboardSourceConfig {
            api_base: "https://unused.example.com".to_string(),
            session_cookie: "session=x".to_string(),
            csrf_token: "token".to_string(),
            request_timeout_ms: 1_000,
            max_retries: 1,
        })
        .expect("dashboard transport");
        let schema_transport = SchemaSourceTransport::new(SchemaSourceConfig {
            api_base: "https://unused.example.com".to_string(),
            request_timeout_ms: 1_000,
            max_retries: 1,
            max_workers: 2,
        })
        .expect("schema transport");
        let config = PipelineConfig {
            base_dir: base_dir.clone(),
            default_catalog: "hive".to_string(),
            max_workers_charts: 2,
            extraction_strategy: ExtractionStrategy::RuleBasedOnly,
            enable_table_validation: false,
            enable_schema_enrichment: false,
            catalog_table: "overall_tables".to_string(),
        };
        let progress = ProgressTracker::load_or_init(config.progress_path()).expect("progress tracker");
        Dependencies {
            dashboard_transport,
            schema_transport,
            gateway: standalone_gateway(),
            config,
            validator_config: TableValidatorConfig::default(),
            progress,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn all_dashboards_ready_via_use_existing_succeed_and_advance_to_merging() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let deps = dependencies(tempdir.path().to_path_buf());
        for dashboard_id in [1_i64, 2] {
            let dir = deps.config.dashboard_dir(dashboard_id);
            std::fs::create_dir_all(&dir).expect("mkdir");
            for path in required_existing_artifacts(&dir, dashboard_id) {
                std::fs::write(path, "x").expect("seed artifact");
            }
        }

        let orchestrator_config = OrchestratorConfig { max_workers_dashboards: 2, continue_on_error: true };
        let outcomes = run_all(&deps, orchestrator_config, vec![1, 2], DashboardMode::UseExisting).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
        assert_eq!(deps.progress.snapshot().overall_status, OverallStatus::Merging);
    }

    #[tokio::test]
    async fn no_dashboards_succeeding_skips_straight_to_completed() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let deps = dependencies(tempdir.path().to_path_buf());

        let orchestrator_config = OrchestratorConfig { max_workers_dashboards: 2, continue_on_error: true };
        let outcomes = run_all(&deps, orchestrator_config, vec![1], DashboardMode::UseExisting).await;

        assert!(outcomes[0].result.is_err());
        assert_eq!(deps.progress.snapshot().overall_status, OverallStatus::Completed);
    }

    #[tokio::test]
    async fn continue_on_error_false_stops_queuing_after_a_failure() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let deps = dependencies(tempdir.path().to_path_buf());

        let orchestrator_config = OrchestratorConfig { max_workers_dashboards: 1, continue_on_error: false };
        let outcomes = run_all(&deps, orchestrator_config, vec![1, 2, 3], DashboardMode::UseExisting).await;

        assert!(outcomes.len() < 3);
        assert!(deps.cancellation.is_cancelled());
    }
}
