use thiserror::Error;

use crate::types::JobId;

/// Errors from the job registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The job was removed, usually because its listener disconnected.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    #[error("job already exists: {0}")]
    DuplicateJob(JobId),
}

/// Reasons a batch is rejected before any job state exists.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no documents in batch")]
    EmptyBatch,

    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("more than one document would be written to {0}")]
    DuplicateOutput(String),

    #[error("invalid language: {0:?}")]
    InvalidLanguage(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
