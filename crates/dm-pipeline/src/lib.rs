//! The extraction-merge pipeline: turns a set of dashboard ids
//! into per-dashboard metadata artifacts by driving each one through 8
//! phases, fanned out across dashboards with bounded concurrency.

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod phase1_extraction;
pub mod phase2_tables_columns;
pub mod phase3_schema_enrichment;
pub mod phase4_table_metadata;
pub mod phase5_column_metadata;
pub mod phase6_joining_conditions;
pub mod phase7_filter_conditions;
pub mod phase8_term_definitions;
pub mod sql_extract;

pub use config::{required_existing_artifacts, ExtractionStrategy, PipelineConfig};
pub use engine::{DashboardMode, PhaseEngine};
pub use error::PhaseError;
pub use orchestrator::{run_all, DashboardOutcome, Dependencies, OrchestratorConfig};
