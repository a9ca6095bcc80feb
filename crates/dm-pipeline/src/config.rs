use std::path::{Path, PathBuf};

/// Phase 2's source-table extraction can run LLM-based, rule-based, or a
/// hybrid of the two. `ENABLE_LLM_EXTRACTION=true` selects
/// `Hybrid` (attempt the LLM first, degrade to rule-based per chart on
/// failure); `false` selects `RuleBasedOnly`, since phases 4/5/6/8 still
/// need the LLM gateway regardless of this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Hybrid,
    RuleBasedOnly,
}

impl ExtractionStrategy {
    pub fn from_enable_llm_extraction(enabled: bool) -> Self {
        if enabled {
            ExtractionStrategy::Hybrid
        } else {
            ExtractionStrategy::RuleBasedOnly
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    pub default_catalog: String,
    pub max_workers_charts: usize,
    pub extraction_strategy: ExtractionStrategy,
    pub enable_table_validation: bool,
    pub enable_schema_enrichment: bool,
    pub catalog_table: String,
}

impl PipelineConfig {
    pub fn dashboard_dir(&self, dashboard_id: i64) -> PathBuf {
        self.base_dir.join(dashboard_id.to_string())
    }

    pub fn merged_dir(&self) -> PathBuf {
        self.base_dir.join("merged_metadata")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.base_dir.join("progress.json")
    }
}

/// The five artifacts a dashboard must already have on disk for
/// `USE_EXISTING` mode to succeed without running any phase.
pub fn required_existing_artifacts(dir: &Path, dashboard_id: i64) -> [PathBuf; 5] {
    [
        dir.join(format!("{dashboard_id}_table_metadata.csv")),
        dir.join(format!("{dashboard_id}_columns_metadata.csv")),
        dir.join(format!("{dashboard_id}_joining_conditions.csv")),
        dir.join(format!("{dashboard_id}_filter_conditions.txt")),
        dir.join(format!("{dashboard_id}_definitions.csv")),
    ]
}
