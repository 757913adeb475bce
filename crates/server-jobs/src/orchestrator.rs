//! Runs one batch of documents through the OCR adapter and reports progress.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use ocr_portal_core::{is_valid_language, output_target, OcrAdapter};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::broadcaster::{ListenerId, ProgressBroadcaster};
use crate::error::{RegistryError, SubmitError};
use crate::registry::JobRegistry;
use crate::types::{
    new_job_id, BatchReport, DocumentTask, DocumentUpload, JobId, ProgressEvent,
};

/// A batch that has been accepted and is now running in the background.
#[derive(Debug)]
pub struct SubmittedBatch {
    pub job_id: JobId,
    /// Output ids in submission order.
    pub outputs: Vec<String>,
    pub handle: JoinHandle<BatchReport>,
}

/// Owns the job registry and progress broadcaster and schedules batches.
///
/// Cheap to share behind an `Arc`; every batch runs on the internal
/// [`TaskTracker`] so shutdown can wait for in-flight work.
pub struct BatchOrchestrator {
    registry: Arc<JobRegistry>,
    broadcaster: Arc<ProgressBroadcaster>,
    adapter: OcrAdapter,
    tracker: TaskTracker,
}

impl BatchOrchestrator {
    pub fn new(adapter: OcrAdapter) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            broadcaster: Arc::new(ProgressBroadcaster::new()),
            adapter,
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    pub fn adapter(&self) -> &OcrAdapter {
        &self.adapter
    }

    /// Accept a batch under a fresh job id.
    pub fn submit(
        &self,
        uploads: Vec<DocumentUpload>,
        language: &str,
    ) -> Result<SubmittedBatch, SubmitError> {
        self.submit_as(new_job_id(), uploads, language)
    }

    /// Accept a batch under `job_id`.
    ///
    /// Validation happens before any job state exists; on `Ok` the registry
    /// entry is in place and the batch task has been spawned.
    pub fn submit_as(
        &self,
        job_id: JobId,
        uploads: Vec<DocumentUpload>,
        language: &str,
    ) -> Result<SubmittedBatch, SubmitError> {
        let tasks = prepare(uploads, language)?;
        let outputs: Vec<String> = tasks.iter().map(|t| t.output_target.clone()).collect();

        self.registry.create(&job_id, tasks.len())?;
        tracing::info!(job_id = %job_id, documents = tasks.len(), language, "Batch accepted");
        metrics::counter!("ocr_batches_total").increment(1);

        let batch = BatchRun {
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::clone(&self.broadcaster),
            adapter: self.adapter.clone(),
            job_id: job_id.clone(),
            language: language.to_string(),
        };
        let handle = self.tracker.spawn(batch.run(tasks));

        Ok(SubmittedBatch {
            job_id,
            outputs,
            handle,
        })
    }

    /// Drop a job's listener and registry entry once its client goes away.
    ///
    /// A connection that was replaced by a newer one for the same job leaves
    /// both the successor's registration and the registry entry alone.
    pub fn detach(&self, job_id: &str, listener_id: ListenerId) {
        let was_current = self.broadcaster.unregister_listener(job_id, listener_id);
        if !was_current && self.broadcaster.is_registered(job_id) {
            tracing::debug!(job_id = %job_id, listener = listener_id, "Replaced listener detached");
            return;
        }
        if self.registry.remove(job_id) {
            tracing::debug!(job_id = %job_id, "Job forgotten after listener disconnect");
        }
    }

    /// Number of batches still running.
    pub fn running_batches(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new work into the tracker and wait for running batches.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Validate a batch and turn it into recognition tasks.
fn prepare(
    uploads: Vec<DocumentUpload>,
    language: &str,
) -> Result<Vec<DocumentTask>, SubmitError> {
    if uploads.is_empty() {
        return Err(SubmitError::EmptyBatch);
    }
    if !is_valid_language(language) {
        return Err(SubmitError::InvalidLanguage(language.to_string()));
    }

    let mut seen = HashSet::with_capacity(uploads.len());
    uploads
        .into_iter()
        .map(|upload| {
            let target = output_target(&upload.filename)
                .ok_or_else(|| SubmitError::InvalidFilename(upload.filename.clone()))?;
            if !seen.insert(target.clone()) {
                return Err(SubmitError::DuplicateOutput(target));
            }
            Ok(DocumentTask {
                output_target: target,
                content: upload.content,
            })
        })
        .collect()
}

struct BatchRun {
    registry: Arc<JobRegistry>,
    broadcaster: Arc<ProgressBroadcaster>,
    adapter: OcrAdapter,
    job_id: JobId,
    language: String,
}

impl BatchRun {
    async fn run(self, tasks: Vec<DocumentTask>) -> BatchReport {
        let job_id = self.job_id.clone();
        let outputs: Vec<String> = tasks.iter().map(|t| t.output_target.clone()).collect();
        let mut report = BatchReport {
            job_id: job_id.clone(),
            outputs: outputs.clone(),
            ..BatchReport::default()
        };

        if let Err(e) = self.registry.mark_running(&job_id) {
            tracing::debug!(job_id = %job_id, error = %e, "Job gone before start");
        }
        metrics::gauge!("ocr_active_jobs").increment(1.0);

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| {
                let adapter = &self.adapter;
                let language = self.language.as_str();
                async move {
                    let result = adapter
                        .invoke(task.content, &task.output_target, language)
                        .await;
                    (task.output_target, result)
                }
            })
            .collect();

        while let Some((file, result)) = pending.next().await {
            match result {
                Ok(elapsed) => {
                    metrics::counter!("ocr_documents_total", "outcome" => "success").increment(1);
                    metrics::histogram!("ocr_duration_seconds").record(elapsed.as_secs_f64());
                    tracing::info!(
                        job_id = %job_id,
                        file = %file,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Document recognized"
                    );
                    report.succeeded.push(file);
                    self.settle(|completed, total| ProgressEvent::Progress { completed, total });
                }
                Err(err) => {
                    metrics::counter!("ocr_documents_total", "outcome" => "failure").increment(1);
                    tracing::warn!(job_id = %job_id, file = %file, error = %err, "Document failed");
                    let event_file = file.clone();
                    report.failed.push(file);
                    self.settle(|completed, total| ProgressEvent::Error {
                        message: err.to_string(),
                        file: event_file,
                        completed,
                        total,
                    });
                }
            }
        }
        drop(pending);

        // Failed documents are listed too; clients see them as missing downloads.
        self.broadcaster
            .publish(&job_id, ProgressEvent::Complete { files: outputs });
        metrics::gauge!("ocr_active_jobs").decrement(1.0);
        tracing::info!(
            job_id = %job_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        report
    }

    /// Count one settled document and publish the resulting event.
    fn settle(&self, event: impl FnOnce(usize, usize) -> ProgressEvent) {
        match self.registry.increment(&self.job_id) {
            Ok((completed, total)) => {
                self.broadcaster.publish(&self.job_id, event(completed, total));
            }
            Err(RegistryError::UnknownJob(_)) => {
                tracing::debug!(job_id = %self.job_id, "Job removed, progress event skipped");
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Progress update failed");
            }
        }
    }
}
