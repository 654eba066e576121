//! Batch control endpoints.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use av1batch_core::{
    check_output_name, AudioProfile, ConversionOptions, EncoderRunner, PipelineError, Quality,
    QueueItem, Resolution,
};

use super::handlers::ErrorResponse;
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Per-batch overrides of the configured defaults. Absent fields keep the
/// default; an empty `output_name` clears a configured one.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartBatchBody {
    pub resolution: Option<Resolution>,
    pub audio: Option<AudioProfile>,
    pub quality: Option<Quality>,
    pub output_name: Option<String>,
}

impl StartBatchBody {
    /// Layers the overrides onto `options`. Fails when the output name is
    /// not a bare file name.
    pub fn apply(self, mut options: ConversionOptions) -> Result<ConversionOptions, String> {
        if let Some(resolution) = self.resolution {
            options.resolution = resolution;
        }
        if let Some(audio) = self.audio {
            options.audio = audio;
        }
        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        match self.output_name {
            Some(name) => {
                check_output_name(&name)?;
                Ok(options.with_output_name(Some(&name)))
            }
            None => Ok(options),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub running: bool,
    pub queue: Vec<QueueItem>,
}

#[derive(Debug, Serialize)]
pub struct StartBatchResponse {
    pub batch_id: String,
    pub options: ConversionOptions,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopping: bool,
}

pub async fn get_status<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<BatchStatusResponse> {
    let pipeline = state.pipeline();
    Json(BatchStatusResponse {
        running: pipeline.is_running(),
        queue: pipeline.queue().await,
    })
}

/// Start converting the pending queue.
///
/// The body is optional; an empty body starts with the configured defaults.
pub async fn start<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StartBatchResponse>), ApiError> {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        StartBatchBody::default()
    } else {
        serde_json::from_slice::<StartBatchBody>(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Invalid batch options: {}", e))),
            )
        })?
    };
    let options = overrides.apply(state.default_options()).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("Invalid batch options: {}", e))),
        )
    })?;

    match state.pipeline().start_batch(options.clone()).await {
        Ok(handle) => Ok((
            StatusCode::ACCEPTED,
            Json(StartBatchResponse {
                batch_id: handle.batch_id().to_string(),
                options: options.normalized(),
            }),
        )),
        Err(e) => Err(rejection(e)),
    }
}

fn rejection(error: PipelineError) -> ApiError {
    let status = match &error {
        PipelineError::AlreadyRunning => StatusCode::CONFLICT,
        PipelineError::EmptyQueue => StatusCode::BAD_REQUEST,
        PipelineError::MissingEncoder { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %error, "Batch could not be started");
    }
    (status, Json(ErrorResponse::new(error.to_string())))
}

/// Cancel the file currently being converted; the batch moves on.
pub async fn cancel<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.pipeline().cancel_current().await,
    })
}

/// Cancel the current file and start no further ones.
pub async fn stop<R: EncoderRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<StopResponse> {
    Json(StopResponse {
        stopping: state.pipeline().stop().await,
    })
}
