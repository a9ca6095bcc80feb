//! Wires the entity-merge modules together into the whole-run Merge Engine:
//! reads each source dashboard's phase 4-8 artifacts, resolves
//! each entity type, and writes the consolidated artifacts plus the
//! always-written conflicts report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dm_llm::LlmGatewayHandle;
use dm_model::csv_io::{
    read_columns_metadata_csv, read_definitions_csv, read_joining_conditions_csv, read_table_metadata_csv,
    write_columns_metadata_csv, write_definitions_csv, write_joining_conditions_csv, write_table_metadata_csv,
};
use dm_model::{ColumnMetadata, ConflictRecord, JoiningCondition, MergeStepStatus, TableMetadata, TermDefinition};
use dm_progress::ProgressTracker;
use serde::Serialize;
use tracing::warn;

use crate::column::{self, ColumnVariant};
use crate::filter::{self, FilterBlock};
use crate::join::{self, JoinVariant};
use crate::table::{self, TableVariant};
use crate::term::{self, TermVariant};

/// A source dashboard to merge in, identified by its per-dashboard
/// artifact directory.
pub struct MergeSource {
    pub dashboard_id: i64,
    pub dir: PathBuf,
}

/// The dashboard id attributed to prior merged state when
/// `include_existing_merged` folds it in as an extra source. Incremental
/// merge resolution is a deterministic function of its variant inputs, so
/// folding the prior merged row back in as one more variant means a prior
/// conflict's resolution only moves when a newly added dashboard actually
/// supplies evidence that changes the winner — otherwise the recomputed
/// value is identical to what was already on disk; a conflict is never
/// re-litigated unless new evidence actually affects the value.
pub const EXISTING_MERGED_SOURCE_ID: i64 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct MergedMetadata {
    pub tables: Vec<TableMetadata>,
    pub columns: Vec<ColumnMetadata>,
    pub joining_conditions: Vec<JoiningCondition>,
    pub definitions: Vec<TermDefinition>,
    pub filter_conditions: String,
}

pub struct MergeOutput {
    pub metadata: MergedMetadata,
    pub conflicts: Vec<ConflictRecord>,
}

fn dashboard_artifact_paths(dir: &Path, dashboard_id: i64) -> [PathBuf; 5] {
    [
        dir.join(format!("{dashboard_id}_table_metadata.csv")),
        dir.join(format!("{dashboard_id}_columns_metadata.csv")),
        dir.join(format!("{dashboard_id}_joining_conditions.csv")),
        dir.join(format!("{dashboard_id}_filter_conditions.txt")),
        dir.join(format!("{dashboard_id}_definitions.csv")),
    ]
}

#[allow(clippy::type_complexity)]
fn merged_artifact_paths(merged_dir: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf, PathBuf, PathBuf, PathBuf) {
    (
        merged_dir.join("consolidated_table_metadata.csv"),
        merged_dir.join("consolidated_columns_metadata.csv"),
        merged_dir.join("consolidated_joining_conditions.csv"),
        merged_dir.join("consolidated_definitions.csv"),
        merged_dir.join("consolidated_filter_conditions.txt"),
        merged_dir.join("conflicts_report.json"),
        merged_dir.join("merged_metadata.json"),
    )
}

struct Loaded {
    tables: Vec<TableVariant>,
    columns: Vec<ColumnVariant>,
    joins: Vec<JoinVariant>,
    terms: Vec<TermVariant>,
    filters: Vec<FilterBlock>,
}

fn load_dashboard(dashboard_id: i64, dir: &Path) -> Result<Loaded> {
    let [table_path, columns_path, joins_path, filter_path, definitions_path] =
        dashboard_artifact_paths(dir, dashboard_id);

    let tables = read_table_metadata_csv(&table_path)
        .with_context(|| format!("reading {}", table_path.display()))?
        .into_iter()
        .map(|metadata| TableVariant { dashboard_id, metadata })
        .collect();
    let columns = read_columns_metadata_csv(&columns_path)
        .with_context(|| format!("reading {}", columns_path.display()))?
        .into_iter()
        .map(|metadata| ColumnVariant { dashboard_id, metadata })
        .collect();
    let joins = read_joining_conditions_csv(&joins_path)
        .with_context(|| format!("reading {}", joins_path.display()))?
        .into_iter()
        .map(|condition| JoinVariant { dashboard_id, condition })
        .collect();
    let terms = read_definitions_csv(&definitions_path)
        .with_context(|| format!("reading {}", definitions_path.display()))?
        .into_iter()
        .map(|term| TermVariant { dashboard_id, term })
        .collect();
    let body = std::fs::read_to_string(&filter_path).unwrap_or_else(|error| {
        warn!(
            dashboard_id,
            error = %error,
            path = %filter_path.display(),
            "merge: filter conditions artifact missing, treating as empty"
        );
        String::new()
    });
    let filters = vec![FilterBlock { dashboard_id, body }];

    Ok(Loaded { tables, columns, joins, terms, filters })
}

fn load_existing_merged(merged_dir: &Path) -> Loaded {
    let (table_path, columns_path, joins_path, definitions_path, filter_path, _, _) =
        merged_artifact_paths(merged_dir);

    let tables = read_table_metadata_csv(&table_path)
        .unwrap_or_default()
        .into_iter()
        .map(|metadata| TableVariant { dashboard_id: EXISTING_MERGED_SOURCE_ID, metadata })
        .collect();
    let columns = read_columns_metadata_csv(&columns_path)
        .unwrap_or_default()
        .into_iter()
        .map(|metadata| ColumnVariant { dashboard_id: EXISTING_MERGED_SOURCE_ID, metadata })
        .collect();
    let joins = read_joining_conditions_csv(&joins_path)
        .unwrap_or_default()
        .into_iter()
        .map(|condition| JoinVariant { dashboard_id: EXISTING_MERGED_SOURCE_ID, condition })
        .collect();
    let terms = read_definitions_csv(&definitions_path)
        .unwrap_or_default()
        .into_iter()
        .map(|term| TermVariant { dashboard_id: EXISTING_MERGED_SOURCE_ID, term })
        .collect();
    let body = std::fs::read_to_string(&filter_path).unwrap_or_default();
    let filters = if body.is_empty() {
        Vec::new()
    } else {
        vec![FilterBlock { dashboard_id: EXISTING_MERGED_SOURCE_ID, body }]
    };

    Loaded { tables, columns, joins, terms, filters }
}

/// Runs the merge engine over `sources`, optionally folding in
/// `merged_dir`'s prior consolidated output as an extra pseudo-source
/// (`include_existing_merged`), then writes every consolidated artifact
/// and the conflicts report into `merged_dir`. The conflicts report is
/// always written, even when empty: emptiness means "no conflicts", not
/// "merge skipped".
pub async fn run(
    gateway: &LlmGatewayHandle,
    progress: &ProgressTracker,
    sources: &[MergeSource],
    merged_dir: &Path,
    include_existing_merged: bool,
) -> Result<MergeOutput> {
    progress.update_merge(MergeStepStatus::Preparing)?;

    let mut tables = Vec::new();
    let mut columns = Vec::new();
    let mut joins = Vec::new();
    let mut terms = Vec::new();
    let mut filters = Vec::new();

    if include_existing_merged {
        let existing = load_existing_merged(merged_dir);
        tables.extend(existing.tables);
        columns.extend(existing.columns);
        joins.extend(existing.joins);
        terms.extend(existing.terms);
        filters.extend(existing.filters);
    }

    for source in sources {
        let loaded = load_dashboard(source.dashboard_id, &source.dir)?;
        tables.extend(loaded.tables);
        columns.extend(loaded.columns);
        joins.extend(loaded.joins);
        terms.extend(loaded.terms);
        filters.extend(loaded.filters);
    }

    let mut conflicts = Vec::new();

    progress.update_merge(MergeStepStatus::TableMetadata)?;
    let table_output = table::merge(gateway, tables).await;
    conflicts.extend(table_output.conflicts);

    progress.update_merge(MergeStepStatus::ColumnsMetadata)?;
    let column_output = column::merge(gateway, columns).await;
    conflicts.extend(column_output.conflicts);

    progress.update_merge(MergeStepStatus::JoiningConditions)?;
    let join_output = join::merge(gateway, joins).await;
    conflicts.extend(join_output.conflicts);

    progress.update_merge(MergeStepStatus::Definitions)?;
    let term_output = term::merge(gateway, terms).await;
    conflicts.extend(term_output.conflicts);

    progress.update_merge(MergeStepStatus::FilterConditions)?;
    let filter_conditions = filter::merge(filters);

    progress.update_merge(MergeStepStatus::ConflictsReport)?;

    let metadata = MergedMetadata {
        tables: table_output.rows,
        columns: column_output.rows,
        joining_conditions: join_output.rows,
        definitions: term_output.rows,
        filter_conditions,
    };

    if let Err(error) = write_merged_artifacts(merged_dir, &metadata, &conflicts) {
        progress.update_merge(MergeStepStatus::Failed).ok();
        return Err(error);
    }

    progress.update_merge(MergeStepStatus::Completed)?;

    Ok(MergeOutput { metadata, conflicts })
}

fn write_merged_artifacts(merged_dir: &Path, metadata: &MergedMetadata, conflicts: &[ConflictRecord]) -> Result<()> {
    std::fs::create_dir_all(merged_dir).with_context(|| format!("creating {}", merged_dir.display()))?;

    let (table_path, columns_path, joins_path, definitions_path, filter_path, conflicts_path, metadata_path) =
        merged_artifact_paths(merged_dir);

    write_table_metadata_csv(&table_path, &metadata.tables)?;
    write_columns_metadata_csv(&columns_path, &metadata.columns)?;
    write_joining_conditions_csv(&joins_path, &metadata.joining_conditions)?;
    write_definitions_csv(&definitions_path, &metadata.definitions)?;
    dm_core::write_text_atomic(&filter_path, &metadata.filter_conditions)?;

    let conflicts_json = serde_json::to_string_pretty(conflicts).context("serializing conflicts_report.json")?;
    dm_core::write_text_atomic(&conflicts_path, &conflicts_json)?;

    let metadata_json = serde_json::to_string_pretty(metadata).context("serializing merged_metadata.json")?;
    dm_core::write_text_atomic(&metadata_path, &metadata_json)?;

    Ok(())
}
