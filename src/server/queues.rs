//! Queue introspection endpoints.
//!
//! Read-only views of the engine's wait queues for debugging and monitoring.
//! Only repositories with pending or running work have a queue.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::AppState;
use crate::types::RepoId;
use crate::worker::QueueSnapshot;

/// Errors returned by the introspection endpoints.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no queue for {0}")]
    NotFound(RepoId),
}

impl IntoResponse for QueueError {
    fn into_response(self) -> Response {
        let status = match &self {
            QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

/// Lists every repository queue, ordered by repository.
///
/// ```ignore
/// GET /api/v1/queues HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// [{"repo": {"owner": "octocat", "repo": "hello-world"},
///   "current": {"type": "wait", "pr": 7, "delay_ms": 60000},
///   "queued": [{"type": "work", "pr": 7}],
///   "scheduled": false}]
/// ```
pub async fn queues_handler(State(app_state): State<AppState>) -> Json<Vec<QueueSnapshot>> {
    Json(app_state.engine().queues())
}

/// Returns the queue of one repository, or 404 if it is idle.
pub async fn repo_queue_handler(
    State(app_state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<QueueSnapshot>, QueueError> {
    let repo = RepoId::new(owner, repo);
    app_state
        .engine()
        .queue_for(&repo)
        .map(Json)
        .ok_or(QueueError::NotFound(repo))
}
