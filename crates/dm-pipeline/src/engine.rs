//! The per-dashboard phase engine: drives one dashboard through all 8
//! phases in order, in `Fresh` or `UseExisting` mode, updating the
//! progress tracker at every phase boundary and stopping on the first
//! phase failure — a phase is never skipped on failure.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dm_core::CancellationToken;
use dm_dashboard_source::DashboardSourceTransport;
use dm_llm::LlmGatewayHandle;
use dm_model::{DashboardRunStatus, Phase};
use dm_progress::ProgressTracker;
use dm_schema_source::SchemaSourceTransport;
use dm_validator::TableValidatorConfig;
use tracing::info;

use crate::config::{required_existing_artifacts, PipelineConfig};
use crate::error::PhaseError;
use crate::{phase1_extraction, phase2_tables_columns, phase3_schema_enrichment, phase4_table_metadata, phase5_column_metadata, phase6_joining_conditions, phase7_filter_conditions, phase8_term_definitions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardMode {
    Fresh,
    UseExisting,
}

pub struct PhaseEngine<'a> {
    pub dashboard_transport: &'a DashboardSourceTransport,
    pub schema_transport: &'a SchemaSourceTransport,
    pub gateway: &'a LlmGatewayHandle,
    pub config: &'a PipelineConfig,
    pub validator_config: &'a TableValidatorConfig,
    pub progress: &'a ProgressTracker,
    pub cancellation: &'a CancellationToken,
}

impl PhaseEngine<'_> {
    pub async fn run_dashboard(&self, dashboard_id: i64, mode: DashboardMode) -> Result<(), PhaseError> {
        let dir = self.config.dashboard_dir(dashboard_id);

        if mode == DashboardMode::UseExisting {
            return self.run_use_existing(dashboard_id, &dir);
        }

        if let Err(error) = dm_core::remove_dir_all_if_exists(&dir) {
            return Err(PhaseError::Artifact(error));
        }
        std::fs::create_dir_all(&dir).map_err(|error| PhaseError::Artifact(anyhow::Error::new(error)))?;

        self.progress
            .update_dashboard(dashboard_id, DashboardRunStatus::Processing, Some(Phase::DashboardExtraction), None, None, None)?;

        let result = self.run_fresh(dashboard_id, &dir).await;

        match &result {
            Ok(()) => {
                self.progress.update_dashboard(dashboard_id, DashboardRunStatus::Completed, None, None, None, None)?;
            }
            Err(error) => {
                self.progress.update_dashboard(
                    dashboard_id,
                    DashboardRunStatus::Error,
                    None,
                    None,
                    None,
                    Some(error.to_string()),
                )?;
            }
        }
        result
    }

    fn run_use_existing(&self, dashboard_id: i64, dir: &Path) -> Result<(), PhaseError> {
        let missing: Vec<String> = required_existing_artifacts(dir, dashboard_id)
            .into_iter()
            .filter(|path| !path.exists())
            .map(|path| path.display().to_string())
            .collect();
        if !missing.is_empty() {
            let detail = missing.join(", ");
            self.progress.update_dashboard(dashboard_id, DashboardRunStatus::Error, None, None, None, Some(detail.clone()))?;
            return Err(PhaseError::MissingExistingArtifacts(detail));
        }
        self.progress.update_dashboard(dashboard_id, DashboardRunStatus::Completed, None, None, None, None)?;
        Ok(())
    }

    async fn run_fresh(&self, dashboard_id: i64, dir: &Path) -> Result<(), PhaseError> {
        self.check_cancelled()?;
        let dashboard = phase1_extraction::run(self.dashboard_transport, dashboard_id, dir).await?;
        self.mark_phase_done(dashboard_id, Phase::DashboardExtraction, format!("{dashboard_id}_json.json"))?;

        self.check_cancelled()?;
        let llm = if self.config.extraction_strategy == crate::config::ExtractionStrategy::Hybrid {
            Some(self.gateway)
        } else {
            None
        };
        let rows = phase2_tables_columns::run(llm, self.config.extraction_strategy, &dashboard, &self.config.default_catalog, self.config.max_workers_charts).await;
        let path = dir.join(format!("{dashboard_id}_tables_columns.csv"));
        dm_model::csv_io::write_tables_columns_csv(&path, &rows).map_err(PhaseError::from)?;
        self.mark_phase_done(dashboard_id, Phase::TablesAndColumns, format!("{dashboard_id}_tables_columns.csv"))?;

        self.check_cancelled()?;
        let outcome = phase3_schema_enrichment::run(
            self.schema_transport,
            self.validator_config,
            self.config.enable_table_validation,
            self.config.enable_schema_enrichment,
            rows,
        )
        .await;
        let enriched_path = dir.join(format!("{dashboard_id}_tables_columns_enriched.csv"));
        dm_model::csv_io::write_tables_columns_enriched_csv(&enriched_path, &outcome.rows).map_err(PhaseError::from)?;
        if !outcome.invalid_tables.is_empty() {
            info!(dashboard_id, invalid = outcome.invalid_tables.len(), "phase 3: tables excluded by validation");
        }
        self.mark_phase_done(dashboard_id, Phase::SchemaEnrichment, format!("{dashboard_id}_tables_columns_enriched.csv"))?;

        self.check_cancelled()?;
        let table_metadata = phase4_table_metadata::run(
            self.gateway,
            self.schema_transport,
            self.validator_config,
            self.config.enable_table_validation,
            &dashboard,
            &outcome.rows,
            self.config.max_workers_charts,
        )
        .await;
        let table_metadata_path = dir.join(format!("{dashboard_id}_table_metadata.csv"));
        dm_model::csv_io::write_table_metadata_csv(&table_metadata_path, &table_metadata).map_err(PhaseError::from)?;
        self.mark_phase_done(dashboard_id, Phase::TableMetadata, format!("{dashboard_id}_table_metadata.csv"))?;

        self.check_cancelled()?;
        let column_metadata = phase5_column_metadata::run(self.gateway, &dashboard, &outcome.rows, self.config.max_workers_charts).await;
        let column_metadata_path = dir.join(format!("{dashboard_id}_columns_metadata.csv"));
        dm_model::csv_io::write_columns_metadata_csv(&column_metadata_path, &column_metadata).map_err(PhaseError::from)?;
        self.mark_phase_done(dashboard_id, Phase::ColumnMetadata, format!("{dashboard_id}_columns_metadata.csv"))?;

        self.check_cancelled()?;
        let joins = phase6_joining_conditions::run(self.gateway, &dashboard, &outcome.rows, self.config.max_workers_charts).await;
        let joins_path = dir.join(format!("{dashboard_id}_joining_conditions.csv"));
        dm_model::csv_io::write_joining_conditions_csv(&joins_path, &joins).map_err(PhaseError::from)?;
        self.mark_phase_done(dashboard_id, Phase::JoiningConditions, format!("{dashboard_id}_joining_conditions.csv"))?;

        self.check_cancelled()?;
        phase7_filter_conditions::run(self.gateway, &dashboard, dir).await?;
        self.mark_phase_done(dashboard_id, Phase::FilterConditions, format!("{dashboard_id}_filter_conditions.txt"))?;

        self.check_cancelled()?;
        let definitions = phase8_term_definitions::run(self.gateway, &dashboard).await;
        let definitions_path = dir.join(format!("{dashboard_id}_definitions.csv"));
        dm_model::csv_io::write_definitions_csv(&definitions_path, &definitions).map_err(PhaseError::from)?;
        self.mark_phase_done(dashboard_id, Phase::TermDefinitions, format!("{dashboard_id}_definitions.csv"))?;

        Ok(())
    }

    fn mark_phase_done(&self, dashboard_id: i64, phase: Phase, completed_file: String) -> Result<(), PhaseError> {
        self.progress
            .update_dashboard(dashboard_id, DashboardRunStatus::Processing, Some(phase), None, Some(completed_file), None)
            .context("updating progress after phase completion")
            .map_err(PhaseError::from)
    }

    fn check_cancelled(&self) -> Result<(), PhaseError> {
        if self.cancellation.is_cancelled() {
            return Err(PhaseError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionStrategy;
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

    fn unused_transports() -> (DashboardSourceTransport, SchemaSourceTransport) {
        let dashboard = DashboardSourceTransport::new(DashboardSourceConfig {
            api_base: "https://unused.example.com".to_string(),
            session_cookie: "session=x".to_string(),
            csrf_token: "token".to_string(),
            request_timeout_ms: 1_000,
            max_retries: 1,
        })
        .expect("dashboard transport");
        let schema = SchemaSourceTransport::new(SchemaSourceConfig {
            api_base: "https://unused.example.com".to_string(),
            request_timeout_ms: 1_000,
            max_retries: 1,
            max_workers: 2,
        })
        .expect("schema transport");
        (dashboard, schema)
    }

    fn base_config(base_dir: PathBuf) -> PipelineConfig {
        PipelineConfig {
            base_dir,
            default_catalog: "hive".to_string(),
            max_workers_charts: 2,
            extraction_strategy: ExtractionStrategy::RuleBasedOnly,
            enable_table_validation: false,
            enable_schema_enrichment: false,
            catalog_table: "overall_tables".to_string(),
        }
    }

    #[tokio::test]
    async fn use_existing_fails_fast_when_artifacts_are_missing() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let config = base_config(tempdir.path().to_path_buf());
        let gateway = standalone_gateway();
        let (dashboard_transport, schema_transport) = unused_transports();
        let validator_config = TableValidatorConfig::default();
        let progress = ProgressTracker::load_or_init(config.progress_path()).expect("progress tracker");
        let cancellation = CancellationToken::new();

        let engine = PhaseEngine {
            dashboard_transport: &dashboard_transport,
            schema_transport: &schema_transport,
            gateway: &gateway,
            config: &config,
            validator_config: &validator_config,
            progress: &progress,
            cancellation: &cancellation,
        };

        let result = engine.run_dashboard(964, DashboardMode::UseExisting).await;
        assert!(matches!(result, Err(PhaseError::MissingExistingArtifacts(_))));
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.dashboards[&964].status, DashboardRunStatus::Error);
    }

    #[tokio::test]
    async fn use_existing_succeeds_when_all_artifacts_present() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let config = base_config(tempdir.path().to_path_buf());
        let dir = config.dashboard_dir(964);
        std::fs::create_dir_all(&dir).expect("mkdir");
        for path in required_existing_artifacts(&dir, 964) {
            std::fs::write(path, "x").expect("seed artifact");
        }

        let gateway = standalone_gateway();
        let (dashboard_transport, schema_transport) = unused_transports();
        let validator_config = TableValidatorConfig::default();
        let progress = ProgressTracker::load_or_init(config.progress_path()).expect("progress tracker");
        let cancellation = CancellationToken::new();

        let engine = PhaseEngine {
            dashboard_transport: &dashboard_transport,
            schema_transport: &schema_transport,
            gateway: &gateway,
            config: &config,
            validator_config: &validator_config,
            progress: &progress,
            cancellation: &cancellation,
        };

        let result = engine.run_dashboard(964, DashboardMode::UseExisting).await;
        assert!(result.is_ok());
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.dashboards[&964].status, DashboardRunStatus::Completed);
    }
}
