use thiserror::Error;

/// Errors the per-dashboard phase engine can raise. A phase failure stops
/// that dashboard: the engine never skips a phase on failure, it records
/// the failure on that phase and stops. continue-on-error is an
/// orchestrator-level policy, not a phase-engine one.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("dashboard source error: {0}")]
    DashboardSource(#[from] dm_dashboard_source::DashboardSourceError),

    #[error("artifact i/o error: {0}")]
    Artifact(#[source] anyhow::Error),

    #[error("phase {phase:?} failed: every sub-item errored ({detail})")]
    PhaseExhausted { phase: dm_model::Phase, detail: String },

    #[error("use-existing mode requires artifacts that are missing: {0}")]
    MissingExistingArtifacts(String),

    #[error("run was cancelled")]
    Cancelled,
}

impl PhaseError {
    /// True when the failure should abort the entire run rather than just
    /// this dashboard — an auth failure is run-fatal because every
    /// dashboard will hit it.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, PhaseError::DashboardSource(error) if error.is_run_fatal())
    }
}

impl From<anyhow::Error> for PhaseError {
    fn from(error: anyhow::Error) -> Self {
        PhaseError::Artifact(error)
    }
}
