//! The Progress Tracker: a single JSON file at the artifact root
//! recording the state of an entire run, rewritten atomically on every
//! mutation so a concurrently-polling status endpoint never observes a
//! torn write.

pub mod tracker;

pub use dm_model::{
    DashboardProgress, DashboardRunStatus, KbBuildStatus, MergeStepStatus, OverallStatus, Phase,
    ProgressState,
};
pub use tracker::ProgressTracker;
