use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                -> submit_job
/// GET    /                -> list_jobs
/// DELETE /                -> clear_jobs
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> cancel_job
/// GET    /{id}/download   -> download_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(jobs::list_jobs)
                .post(jobs::submit_job)
                .delete(jobs::clear_jobs),
        )
        .route("/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/{id}/download", get(jobs::download_job))
}
