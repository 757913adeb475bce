//! Per-job progress counters shared by every in-flight document.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::RegistryError;
use crate::types::{JobId, JobSnapshot, JobStatus};

#[derive(Debug)]
struct JobCounters {
    total: usize,
    completed: usize,
    status: JobStatus,
}

/// Map of job id -> counters.
///
/// Updates go through the map's per-shard write lock, so concurrent
/// increments for one job are serialized and never lost.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, JobCounters>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job with `completed = 0`.
    pub fn create(&self, job_id: &str, total: usize) -> Result<(), RegistryError> {
        match self.jobs.entry(job_id.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateJob(job_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(JobCounters {
                    total,
                    completed: 0,
                    status: JobStatus::Created,
                });
                Ok(())
            }
        }
    }

    /// Transition `Created -> Running`.
    pub fn mark_running(&self, job_id: &str) -> Result<(), RegistryError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::UnknownJob(job_id.to_string()))?;
        if job.status == JobStatus::Created {
            job.status = JobStatus::Running;
        }
        Ok(())
    }

    /// Record one settled document. Returns the new `(completed, total)`.
    pub fn increment(&self, job_id: &str) -> Result<(usize, usize), RegistryError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::UnknownJob(job_id.to_string()))?;

        if job.completed < job.total {
            job.completed += 1;
        } else {
            tracing::warn!(job_id = %job_id, total = job.total, "Increment past total ignored");
        }
        if job.completed == job.total {
            job.status = JobStatus::Finished;
        }
        Ok((job.completed, job.total))
    }

    /// Delete a job. Removing an absent job is a no-op.
    pub fn remove(&self, job_id: &str) -> bool {
        self.jobs.remove(job_id).is_some()
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.get(job_id).map(|job| JobSnapshot {
            job_id: job_id.to_string(),
            total: job.total,
            completed: job.completed,
            status: job.status,
        })
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
