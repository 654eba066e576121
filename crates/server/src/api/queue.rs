//! Queue endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use av1batch_core::{EncoderRunner, EnqueueOutcome, PipelineError, QueueItem};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Request body naming a file or folder.
#[derive(Debug, Deserialize)]
pub struct PathBody {
    pub path: String,
}

impl PathBody {
    fn checked(&self) -> Result<PathBuf, (StatusCode, Json<ErrorResponse>)> {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("path must not be empty")),
            ));
        }
        Ok(PathBuf::from(trimmed))
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub path: PathBuf,
    pub outcome: EnqueueOutcome,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub found: usize,
    pub added: usize,
    pub files: Vec<EnqueueResponse>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
}

/// Current queue snapshot
pub async fn list_queue<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<Vec<QueueItem>> {
    Json(state.pipeline().queue().await)
}

/// Add one file
pub async fn enqueue<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(body): Json<PathBody>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, Json<ErrorResponse>)> {
    let path = body.checked()?;
    let outcome = state.pipeline().enqueue(&path).await;
    let status = match outcome {
        EnqueueOutcome::Duplicate => StatusCode::OK,
        EnqueueOutcome::Accepted | EnqueueOutcome::Requeued => StatusCode::CREATED,
    };
    Ok((status, Json(EnqueueResponse { path, outcome })))
}

/// Add every video in a folder
pub async fn enqueue_folder<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(body): Json<PathBody>,
) -> Result<Json<FolderResponse>, (StatusCode, Json<ErrorResponse>)> {
    let dir = body.checked()?;
    match state.pipeline().enqueue_folder(&dir).await {
        Ok(outcomes) => {
            let files: Vec<EnqueueResponse> = outcomes
                .into_iter()
                .map(|(path, outcome)| EnqueueResponse { path, outcome })
                .collect();
            let added = files
                .iter()
                .filter(|f| f.outcome != EnqueueOutcome::Duplicate)
                .count();
            Ok(Json(FolderResponse {
                found: files.len(),
                added,
                files,
            }))
        }
        Err(PipelineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "Folder not found: {}",
                dir.display()
            ))),
        )),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}

/// Remove a file that is not being converted
pub async fn remove<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(body): Json<PathBody>,
) -> Result<Json<RemoveResponse>, (StatusCode, Json<ErrorResponse>)> {
    let path = body.checked()?;
    if state.pipeline().remove(&path).await {
        Ok(Json(RemoveResponse { removed: true }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!(
                "Not in queue or currently converting: {}",
                path.display()
            ))),
        ))
    }
}
