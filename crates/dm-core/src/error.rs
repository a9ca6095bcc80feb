use thiserror::Error;

/// The error-kind taxonomy shared across the extraction-merge pipeline.
///
/// Each variant carries the propagation semantics documented for it: some
/// are fatal at the run level, some are terminal only for the current
/// sub-item, some are filtered silently. See the call sites in
/// `dm-pipeline` for how each kind is handled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("upstream authentication failed: {0}")]
    Auth(String),

    #[error("upstream transient failure: {0}")]
    UpstreamTransient(String),

    #[error("upstream resource not found: {0}")]
    UpstreamNotFound(String),

    #[error("LLM provider rate limited the request after retries: {0}")]
    RateLimited(String),

    #[error("LLM output could not be parsed as structured data: {0}")]
    MalformedLlmOutput(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    /// `true` for errors that abort the whole run rather than a single
    /// dashboard or sub-item.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, PipelineError::Auth(_) | PipelineError::InvariantViolation(_))
    }
}
