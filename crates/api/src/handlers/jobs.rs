//! Handlers for the `/jobs` resource.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use melody_core::error::CoreError;
use melody_core::job::{JobAcknowledgment, JobDetail, JobRequest, JobStatus, JobSummary};
use melody_core::types::JobId;
use melody_worker::manager::ARTIFACT_ENTITY;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::response::{DataResponse, RemovedCount};
use crate::state::AppState;

/// Optional `?status=` filter shared by list and clear.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    /// Parse the filter; an unknown status is a validation error.
    fn filter(&self) -> Result<Option<JobStatus>, CoreError> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Validate and admit a job. Returns 202 with the acknowledgment, or 429
/// when the admission queue is full.
pub async fn submit_job(
    State(state): State<AppState>,
    AppJson(input): AppJson<JobRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.submit(input).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobAcknowledgment::from(&job),
        }),
    ))
}

// ---------------------------------------------------------------------------
// List / clear
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List jobs in submission order. Supports an optional `status` filter.
pub async fn list_jobs(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = params.filter()?;
    let jobs: Vec<JobSummary> = state
        .jobs
        .list(filter)
        .await
        .iter()
        .map(JobSummary::from)
        .collect();

    Ok(Json(DataResponse { data: jobs }))
}

/// DELETE /api/v1/jobs
///
/// Remove every job that is not processing, optionally only those with the
/// given `status`. Artifacts of removed jobs are deleted.
pub async fn clear_jobs(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = params.filter()?;
    let removed = state.jobs.clear(filter).await;

    Ok(Json(DataResponse {
        data: RemovedCount { removed },
    }))
}

// ---------------------------------------------------------------------------
// Single job
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(job_id).await?;
    Ok(Json(DataResponse {
        data: JobDetail::from(&job),
    }))
}

/// DELETE /api/v1/jobs/{id}
///
/// Cancel a job that is not processing. Returns 204, or 409 while the job
/// is processing.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<StatusCode> {
    state.jobs.cancel(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/jobs/{id}/download
///
/// Stream a completed job's audio file as an attachment.
pub async fn download_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    let artifact = state.jobs.artifact(job_id).await?;

    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::Core(CoreError::NotFound {
                entity: ARTIFACT_ENTITY,
                id: job_id,
            }),
            _ => AppError::InternalError(e.to_string()),
        })?;
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    tracing::debug!(
        job_id = %job_id,
        file = %artifact.file_name,
        file_size,
        "Serving artifact",
    );

    let stream = ReaderStream::new(file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.format.content_type())
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
