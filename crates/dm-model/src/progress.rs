use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Idle,
    Extracting,
    Merging,
    BuildingKb,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DashboardRunStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// The 8 sequential phases of a dashboard run, numbered as in the phase table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DashboardExtraction = 1,
    TablesAndColumns = 2,
    SchemaEnrichment = 3,
    TableMetadata = 4,
    ColumnMetadata = 5,
    JoiningConditions = 6,
    FilterConditions = 7,
    TermDefinitions = 8,
}

impl Phase {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn all_in_order() -> [Phase; 8] {
        [
            Phase::DashboardExtraction,
            Phase::TablesAndColumns,
            Phase::SchemaEnrichment,
            Phase::TableMetadata,
            Phase::ColumnMetadata,
            Phase::JoiningConditions,
            Phase::FilterConditions,
            Phase::TermDefinitions,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardProgress {
    pub dashboard_id: i64,
    pub status: DashboardRunStatus,
    pub phase: Option<Phase>,
    pub current_file: Option<String>,
    pub completed_files: Vec<String>,
    pub error: Option<String>,
}

impl DashboardProgress {
    pub fn pending(dashboard_id: i64) -> Self {
        Self {
            dashboard_id,
            status: DashboardRunStatus::Pending,
            phase: None,
            current_file: None,
            completed_files: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStepStatus {
    NotStarted,
    Preparing,
    TableMetadata,
    ColumnsMetadata,
    JoiningConditions,
    Definitions,
    FilterConditions,
    ConflictsReport,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KbBuildStatus {
    NotStarted,
    Building,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressState {
    pub overall_status: OverallStatus,
    pub current_operation: Option<String>,
    pub dashboards: BTreeMap<i64, DashboardProgress>,
    pub merge_status: MergeStepStatus,
    pub kb_build_status: KbBuildStatus,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub last_update: chrono::DateTime<chrono::Utc>,
}

impl ProgressState {
    pub fn fresh(start_time: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            overall_status: OverallStatus::Idle,
            current_operation: None,
            dashboards: BTreeMap::new(),
            merge_status: MergeStepStatus::NotStarted,
            kb_build_status: KbBuildStatus::NotStarted,
            start_time,
            last_update: start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_numbers_follow_the_phase_table_order() {
        let phases = Phase::all_in_order();
        for (index, phase) in phases.iter().enumerate() {
            assert_eq!(phase.number(), (index + 1) as u8);
        }
    }

    #[test]
    fn fresh_progress_state_starts_idle_with_no_dashboards() {
        let now = chrono::Utc::now();
        let state = ProgressState::fresh(now);
        assert_eq!(state.overall_status, OverallStatus::Idle);
        assert!(state.dashboards.is_empty());
        assert_eq!(state.merge_status, MergeStepStatus::NotStarted);
        assert_eq!(state.kb_build_status, KbBuildStatus::NotStarted);
    }
}
