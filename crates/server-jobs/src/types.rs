//! Types for the batch job system.

use bytes::Bytes;
use serde::Serialize;

/// Unique identifier for a submitted batch.
pub type JobId = String;

/// Generate a fresh, collision-resistant job id.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Running,
    Finished,
}

/// Point-in-time view of a job's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub total: usize,
    pub completed: usize,
    pub status: JobStatus,
}

/// Event pushed to the job's listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// One document finished successfully.
    Progress { completed: usize, total: usize },
    /// One document failed; the batch continues.
    Error {
        message: String,
        file: String,
        completed: usize,
        total: usize,
    },
    /// Every document has settled.
    Complete { files: Vec<String> },
}

impl ProgressEvent {
    /// `(completed, total)` for settle events, `None` for `complete`.
    pub fn counts(&self) -> Option<(usize, usize)> {
        match self {
            ProgressEvent::Progress { completed, total }
            | ProgressEvent::Error {
                completed, total, ..
            } => Some((*completed, *total)),
            ProgressEvent::Complete { .. } => None,
        }
    }
}

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub content: Bytes,
}

impl DocumentUpload {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// A document ready for recognition. Owns its bytes, so it outlives the
/// request that delivered it.
#[derive(Debug, Clone)]
pub struct DocumentTask {
    pub output_target: String,
    pub content: Bytes,
}

/// Outcome of a whole batch, returned by the batch task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub job_id: JobId,
    /// Every output id in submission order, failed ones included.
    pub outputs: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn settled(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
