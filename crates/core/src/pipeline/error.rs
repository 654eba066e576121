//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a pipeline operation was rejected.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A batch is already in progress.
    #[error("A batch is already running")]
    AlreadyRunning,

    /// Nothing is pending.
    #[error("No pending files in the queue")]
    EmptyQueue,

    /// The configured encoder cannot be used.
    #[error("Encoder not found at path: {path}")]
    MissingEncoder { path: PathBuf },

    /// Filesystem error outside of a single conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Metric label of a batch start rejection.
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            Self::AlreadyRunning => "already_running",
            Self::EmptyQueue => "empty_queue",
            Self::MissingEncoder { .. } => "missing_encoder",
            Self::Io(_) => "io",
        }
    }
}
