use thiserror::Error;

/// Errors the merge engine can raise. Per-field and per-entity LLM
/// disagreements never error out here — they become conflict records; this
/// type only covers failures that prevent the merge from producing output
/// at all.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no source dashboards had any artifacts to merge")]
    NoSources,

    #[error("failed to read source artifact: {0}")]
    ReadArtifact(#[source] anyhow::Error),

    #[error("failed to write merged artifact: {0}")]
    WriteArtifact(#[source] anyhow::Error),
}

impl From<anyhow::Error> for MergeError {
    fn from(error: anyhow::Error) -> Self {
        MergeError::WriteArtifact(error)
    }
}
