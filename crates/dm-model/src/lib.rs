//! The extraction-merge pipeline's data model: dashboards/charts, the
//! per-dashboard flat tables-columns table, per-dashboard LLM-produced
//! metadata rows, conflict records, and progress state. Plus CSV
//! (de)serialization matching the stable artifact schemas written to disk.

pub mod conflict;
pub mod csv_io;
pub mod dashboard;
pub mod metadata;
pub mod progress;
pub mod table_column;

pub use conflict::{ConflictKind, ConflictRecord};
pub use dashboard::{ChartRecord, ChartType, DashboardRecord, DashboardSummary, Filter, Metric, TimeRange};
pub use metadata::{
    ColumnMetadata, FilterConditionsDoc, JoiningCondition, JoiningType, TableMetadata,
    TermDefinition,
};
pub use progress::{
    DashboardProgress, DashboardRunStatus, KbBuildStatus, MergeStepStatus, OverallStatus, Phase,
    ProgressState,
};
pub use table_column::{SourceOrDerived, TableColumnRow};
