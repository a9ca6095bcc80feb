//! The Progress Tracker: single source of truth for run state,
//! following `ProcessManager`'s `Arc<Mutex<...>>` + poison-safe
//! `lock_or_recover` pattern, generalized from a per-process snapshot map
//! to the run-wide `ProgressState` this pipeline needs, with durable JSON
//! persistence on every mutation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use dm_core::write_text_atomic;
use dm_model::{
    DashboardProgress, DashboardRunStatus, KbBuildStatus, MergeStepStatus, OverallStatus, Phase,
    ProgressState,
};
use tracing::warn;

#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressState>>,
    path: PathBuf,
}

impl ProgressTracker {
    /// Loads `progress.json` at `path` if present, otherwise initializes a
    /// fresh `ProgressState`. The tracker is a process singleton per
    /// artifact directory: callers share one handle rather than each
    /// opening their own file.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            ProgressState::fresh(chrono::Utc::now())
        };
        let tracker = Self { inner: Arc::new(Mutex::new(state)), path };
        tracker.persist()?;
        Ok(tracker)
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().clone()
    }

    pub fn update_overall(&self, status: OverallStatus, current_operation: Option<String>) -> Result<()> {
        {
            let mut state = self.lock();
            state.overall_status = status;
            state.current_operation = current_operation;
            state.last_update = chrono::Utc::now();
        }
        self.persist()
    }

    /// `completed_file`, when given, is additive: it appends to the
    /// dashboard's `completed_files` set rather than replacing it.
    /// Phase transitions are monotonic: a call that would move the
    /// dashboard's phase backward is logged and ignored rather than applied.
    #[allow(clippy::too_many_arguments)]
    pub fn update_dashboard(
        &self,
        dashboard_id: i64,
        status: DashboardRunStatus,
        phase: Option<Phase>,
        current_file: Option<String>,
        completed_file: Option<String>,
        error: Option<String>,
    ) -> Result<()> {
        {
            let mut state = self.lock();
            let entry = state
                .dashboards
                .entry(dashboard_id)
                .or_insert_with(|| DashboardProgress::pending(dashboard_id));

            entry.status = status;
            if let Some(phase) = phase {
                match entry.phase {
                    Some(existing) if phase < existing => {
                        warn!(
                            dashboard_id,
                            ?existing,
                            attempted = ?phase,
                            "progress tracker: ignoring backward phase transition"
                        );
                    }
                    _ => entry.phase = Some(phase),
                }
            }
            if let Some(file) = current_file {
                entry.current_file = Some(file);
            }
            if let Some(file) = completed_file {
                if !entry.completed_files.contains(&file) {
                    entry.completed_files.push(file);
                }
            }
            if error.is_some() {
                entry.error = error;
            }
            state.last_update = chrono::Utc::now();
        }
        self.persist()
    }

    pub fn update_merge(&self, status: MergeStepStatus) -> Result<()> {
        {
            let mut state = self.lock();
            state.merge_status = status;
            state.last_update = chrono::Utc::now();
        }
        self.persist()
    }

    pub fn update_kb_build(&self, status: KbBuildStatus) -> Result<()> {
        {
            let mut state = self.lock();
            state.kb_build_status = status;
            state.last_update = chrono::Utc::now();
        }
        self.persist()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self) -> Result<()> {
        let body = {
            let state = self.lock();
            serde_json::to_string_pretty(&*state).context("failed to serialize progress state")?
        };
        write_text_atomic(&self.path, &body)
    }
}
