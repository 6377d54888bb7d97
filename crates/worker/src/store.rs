use indexmap::IndexMap;
use melody_core::job::{JobRecord, JobStatus};
use melody_core::types::JobId;
use tokio::sync::RwLock;

/// Result of [`JobStore::remove_if`].
#[derive(Debug)]
pub enum Removal {
    /// The predicate held and the record was removed.
    Removed(JobRecord),
    /// The predicate did not hold; the record is untouched.
    Kept(JobRecord),
    Missing,
}

/// Concurrency-safe map from job id to job record.
///
/// Iteration follows insertion order. All mutations take the write lock,
/// so a check and the mutation it guards are atomic.
pub struct JobStore {
    jobs: RwLock<IndexMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert a record, replacing any record with the same id.
    pub async fn insert(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id(), record);
    }

    /// Insert `record` only if `gate` accepts it.
    ///
    /// `gate` runs under the write lock, so anything it publishes (such as
    /// enqueuing the id) cannot be observed by a reader before the record
    /// itself is visible. A rejected record leaves no trace.
    pub async fn insert_if<E>(
        &self,
        record: JobRecord,
        gate: impl FnOnce(&JobRecord) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut jobs = self.jobs.write().await;
        gate(&record)?;
        jobs.insert(record.id(), record);
        Ok(())
    }

    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Snapshot of all records, optionally restricted to one status.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| status.map_or(true, |s| job.status() == s))
            .cloned()
            .collect()
    }

    /// Apply `mutate` to the record in place. Returns `None` if absent.
    pub async fn update<R>(&self, id: JobId, mutate: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        self.jobs.write().await.get_mut(&id).map(mutate)
    }

    /// Remove the record only if `predicate` holds at the moment of removal.
    pub async fn remove_if(&self, id: JobId, predicate: impl FnOnce(&JobRecord) -> bool) -> Removal {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get(&id) else {
            return Removal::Missing;
        };
        if !predicate(job) {
            return Removal::Kept(job.clone());
        }
        match jobs.shift_remove(&id) {
            Some(job) => Removal::Removed(job),
            None => Removal::Missing,
        }
    }

}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
