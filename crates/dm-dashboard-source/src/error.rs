use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardSourceError {
    #[error("invalid dashboard source configuration: {0}")]
    InvalidConfig(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("dashboard source item not found: {0}")]
    NotFound(String),
    #[error("dashboard source returned a transient failure: {0}")]
    Transient(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl DashboardSourceError {
    /// True when the failure should abort the whole run rather than being
    /// attributed to a single dashboard — a 401 is fatal because it means
    /// the configured credentials are bad for every dashboard.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, DashboardSourceError::Auth(_))
    }
}
