//! Job Manager: the facade request handlers talk to.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use melody_core::error::CoreError;
use melody_core::job::{JobRecord, JobRequest, JobState, JobStatus, OutputFormat, JOB_ENTITY};
use melody_core::naming::DEFAULT_SLUG_MAX_LEN;
use melody_core::types::JobId;
use melody_engine::GenerationEngine;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::artifacts;
use crate::queue::AdmissionQueue;
use crate::store::{JobStore, Removal};
use crate::worker;

/// Entity name used when a completed job's file is missing on disk.
pub const ARTIFACT_ENTITY: &str = "Artifact";

const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => unreachable!(),
};
const DEFAULT_FAULT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Directory holding generated artifacts.
    pub output_dir: PathBuf,
    pub queue_capacity: NonZeroUsize,
    pub slug_max_len: usize,
    /// Pause after a worker fault before the next dequeue.
    pub fault_backoff: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            slug_max_len: DEFAULT_SLUG_MAX_LEN,
            fault_backoff: DEFAULT_FAULT_BACKOFF,
        }
    }
}

/// A completed job's file, ready to be served.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub format: OutputFormat,
}

struct WorkerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the job store, the admission queue, the engine and the worker task.
///
/// Shared as `Arc<JobManager>`; [`start`](Self::start) needs the `Arc` to
/// hand a clone to the worker task.
pub struct JobManager {
    store: JobStore,
    queue: AdmissionQueue,
    engine: Arc<dyn GenerationEngine>,
    settings: ManagerSettings,
    /// Serializes `start` and `stop`.
    lifecycle: Mutex<()>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl JobManager {
    pub fn new(engine: Arc<dyn GenerationEngine>, settings: ManagerSettings) -> Self {
        Self {
            store: JobStore::new(),
            queue: AdmissionQueue::new(settings.queue_capacity),
            engine,
            settings,
            lifecycle: Mutex::new(()),
            worker: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    pub fn engine(&self) -> &Arc<dyn GenerationEngine> {
        &self.engine
    }

    /// Validate and admit a new job.
    ///
    /// The id is enqueued before the record becomes visible, under the
    /// store's write lock. A full queue rejects the job with
    /// [`CoreError::AdmissionRejected`] and nothing is stored.
    pub async fn submit(&self, request: JobRequest) -> Result<JobRecord, CoreError> {
        request.validate()?;
        let record = JobRecord::new(request);

        self.store
            .insert_if(record.clone(), |job| self.queue.enqueue(job.id()))
            .await
            .inspect_err(|e| {
                tracing::warn!(job_id = %record.id(), error = %e, "Job rejected");
            })?;

        tracing::info!(
            job_id = %record.id(),
            format = %record.format(),
            queued = self.queue.len(),
            "Job queued",
        );
        Ok(record)
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, CoreError> {
        self.store.get(id).await.ok_or(CoreError::NotFound {
            entity: JOB_ENTITY,
            id,
        })
    }

    /// All records in submission order, optionally filtered by status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        self.store.list(status).await
    }

    /// Remove a job that is not processing, deleting its artifact if any.
    ///
    /// A queued job's id stays in the queue; the worker skips it.
    pub async fn cancel(&self, id: JobId) -> Result<JobRecord, CoreError> {
        match self
            .store
            .remove_if(id, |job| job.status() != JobStatus::Processing)
            .await
        {
            Removal::Missing => Err(CoreError::NotFound {
                entity: JOB_ENTITY,
                id,
            }),
            Removal::Kept(job) => Err(CoreError::InvalidState {
                id,
                status: job.status(),
                action: "cancel",
            }),
            Removal::Removed(job) => {
                self.discard_artifact(&job).await;
                tracing::info!(job_id = %id, status = %job.status(), "Job cancelled");
                Ok(job)
            }
        }
    }

    /// Remove every non-processing job matching `status` (all statuses when
    /// `None`). Returns the number of records removed.
    pub async fn clear(&self, status: Option<JobStatus>) -> usize {
        let candidates: Vec<JobId> = self
            .store
            .list(status)
            .await
            .iter()
            .filter(|job| clearable(job, status))
            .map(JobRecord::id)
            .collect();

        let mut removed = 0;
        for id in candidates {
            if self.remove_clearable(id, status).await {
                removed += 1;
            }
        }

        tracing::info!(
            status = status.map(JobStatus::as_str).unwrap_or("ALL"),
            removed,
            "Jobs cleared",
        );
        removed
    }

    /// Remove one job if it still matches the `clear` filter, deleting its
    /// artifact. Returns whether it was removed.
    ///
    /// The status is checked under the store lock, so a job the worker
    /// started since it was listed is kept.
    pub async fn remove_clearable(&self, id: JobId, status: Option<JobStatus>) -> bool {
        match self.store.remove_if(id, |job| clearable(job, status)).await {
            Removal::Removed(job) => {
                self.discard_artifact(&job).await;
                true
            }
            Removal::Kept(_) | Removal::Missing => false,
        }
    }

    /// Locate the file of a completed job.
    ///
    /// Fails with `NotFound` for an unknown id or a missing file, and with
    /// `InvalidState` while the job has not completed.
    pub async fn artifact(&self, id: JobId) -> Result<Artifact, CoreError> {
        let job = self.get(id).await?;
        let JobState::Completed { output_name } = job.state() else {
            return Err(CoreError::InvalidState {
                id,
                status: job.status(),
                action: "download",
            });
        };

        let path = self.artifact_path(output_name);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(Artifact {
                path,
                file_name: output_name.clone(),
                format: job.format(),
            }),
            Ok(false) => Err(CoreError::NotFound {
                entity: ARTIFACT_ENTITY,
                id,
            }),
            Err(e) => Err(CoreError::Internal(format!(
                "failed to stat artifact {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn artifact_path(&self, output_name: &str) -> PathBuf {
        self.settings.output_dir.join(output_name)
    }

    /// Initialize the engine and start the worker task.
    ///
    /// Idempotent: a second call while running only logs. An engine that
    /// fails to initialize is logged and the worker starts anyway; its
    /// jobs then fail individually.
    pub async fn start(self: &Arc<Self>) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.worker.lock().await.is_some() {
            tracing::warn!("Job worker already running");
            return;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.output_dir).await {
            tracing::error!(
                output_dir = %self.settings.output_dir.display(),
                error = %e,
                "Failed to create output directory",
            );
        }

        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.initialize()).await {
            Ok(Ok(())) => tracing::info!("Generation engine ready"),
            Ok(Err(e)) => tracing::error!(error = %e, "Generation engine failed to initialize"),
            Err(e) => tracing::error!(error = %e, "Generation engine initialization aborted"),
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker::run(Arc::clone(self), cancel.clone()));
        *self.worker.lock().await = Some(WorkerHandle { cancel, task });
    }

    /// Signal the worker to stop and wait for it to exit.
    ///
    /// A job already handed to the engine is not interrupted; the worker
    /// exits after the current iteration. No-op when not running.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(handle) = self.worker.lock().await.take() else {
            return;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            tracing::error!(error = %e, "Job worker task ended abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    async fn discard_artifact(&self, job: &JobRecord) {
        if let Some(name) = job.output_name() {
            artifacts::remove_best_effort(&self.artifact_path(name)).await;
        }
    }
}

/// Whether `clear` with this filter may remove `job`.
fn clearable(job: &JobRecord, status: Option<JobStatus>) -> bool {
    job.status() != JobStatus::Processing && status.map_or(true, |s| job.status() == s)
}
