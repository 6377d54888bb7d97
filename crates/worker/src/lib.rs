//! Job admission, queueing and execution.
//!
//! A [`JobManager`] owns the three moving parts:
//!
//! - [`JobStore`]: the authoritative, insertion-ordered map of job records.
//! - [`AdmissionQueue`]: a bounded FIFO of job ids. A full queue rejects
//!   submissions immediately; it is the only backpressure.
//! - the worker loop: one background task that drains the queue and runs
//!   each job through the [`GenerationEngine`](melody_engine::GenerationEngine)
//!   on a blocking thread, one job at a time.
//!
//! The queue only holds ids. A queued id whose record was cancelled is
//! skipped by the worker.

mod artifacts;
pub mod manager;
pub mod queue;
pub mod store;
pub mod worker;

pub use manager::{Artifact, JobManager, ManagerSettings};
pub use queue::{AdmissionQueue, Ticket};
pub use store::{JobStore, Removal};
pub use worker::WorkerFault;
