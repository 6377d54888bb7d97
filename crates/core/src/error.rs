use crate::job::JobStatus;
use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The admission queue is at capacity. Never retried internally.
    #[error("Admission rejected: queue is full (capacity {capacity})")]
    AdmissionRejected { capacity: usize },

    #[error("Cannot {action} job {id} while it is {status}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
