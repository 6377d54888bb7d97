//! Background worker loop.
//!
//! A single long-lived Tokio task that drains the admission queue and runs
//! each job through the generation engine, one at a time. The engine call
//! is synchronous and runs on the blocking pool so the runtime stays
//! responsive while a job is processing.

use std::sync::Arc;

use chrono::Utc;
use melody_core::error::CoreError;
use melody_core::naming;
use melody_core::types::JobId;
use melody_engine::GenerationRequest;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::manager::JobManager;
use crate::queue::Ticket;

/// Failure of the loop itself, as opposed to a job failing.
///
/// A fault is logged and followed by a backoff pause; the loop keeps
/// running.
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("generation task did not finish: {0}")]
    EngineTask(#[from] JoinError),

    #[error("job {0} vanished while processing")]
    RecordVanished(JobId),

    #[error(transparent)]
    Transition(#[from] CoreError),
}

/// Run the worker loop until the cancellation token is triggered.
pub(crate) async fn run(manager: Arc<JobManager>, cancel: CancellationToken) {
    let backoff = manager.settings().fault_backoff;
    tracing::info!(
        capacity = manager.queue().capacity(),
        "Job worker started",
    );

    loop {
        let ticket = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ticket = manager.queue().dequeue() => match ticket {
                Some(ticket) => ticket,
                None => break,
            },
        };

        let id = ticket.id();
        if let Err(fault) = process(&manager, ticket).await {
            tracing::error!(
                job_id = %id,
                error = %fault,
                backoff_secs = backoff.as_secs_f64(),
                "Worker fault",
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    tracing::info!("Job worker shutting down");
}

/// Process one dequeued id. The ticket is acknowledged when this returns,
/// whatever the outcome.
async fn process(manager: &JobManager, ticket: Ticket<'_>) -> Result<(), WorkerFault> {
    let id = ticket.id();
    let now = Utc::now();

    let started = manager
        .store()
        .update(id, |job| job.start_processing(now).map(|()| job.clone()))
        .await;
    let job = match started {
        Some(result) => result?,
        None => {
            tracing::debug!(job_id = %id, "Skipping job removed while queued");
            return Ok(());
        }
    };

    let settings = manager.settings();
    let output_name =
        naming::artifact_filename(job.prompt(), id, job.format(), settings.slug_max_len);
    let out_path = settings.output_dir.join(&output_name);
    let request = GenerationRequest::from(job.request());

    tracing::info!(
        job_id = %id,
        prompt = %request.prompt,
        duration_ms = request.duration_ms,
        format = %request.format,
        output = %output_name,
        "Processing job",
    );

    let engine = Arc::clone(manager.engine());
    let outcome = tokio::task::spawn_blocking(move || engine.generate(&request, &out_path)).await;
    let finished = Utc::now();

    match outcome {
        Ok(Ok(_)) => {
            manager
                .store()
                .update(id, |job| job.complete(output_name, finished))
                .await
                .ok_or(WorkerFault::RecordVanished(id))??;
            tracing::info!(job_id = %id, "Job completed");
        }
        Ok(Err(e)) => {
            tracing::error!(job_id = %id, error = %e, "Job failed");
            manager
                .store()
                .update(id, |job| job.fail(e.to_string(), finished))
                .await
                .ok_or(WorkerFault::RecordVanished(id))??;
        }
        Err(join_error) => {
            // Never leave the record stuck in PROCESSING.
            let message = format!("generation task did not finish: {join_error}");
            match manager
                .store()
                .update(id, |job| job.fail(message, finished))
                .await
            {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    tracing::warn!(job_id = %id, error = %e, "Could not mark job failed");
                }
                None => {
                    tracing::warn!(job_id = %id, "Job vanished before it could be marked failed");
                }
            }
            return Err(WorkerFault::EngineTask(join_error));
        }
    }

    drop(ticket);
    Ok(())
}
