pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                  submit (POST), list (GET), clear (DELETE)
/// /jobs/{id}             get (GET), cancel (DELETE)
/// /jobs/{id}/download    stream artifact (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
