//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder binary not found.
    #[error("Encoder not found at path: {path}")]
    MissingEncoder { path: PathBuf },

    /// The encoder process could not be started.
    #[error("Failed to start encoder: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O error while talking to the encoder process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The encoder exited with something other than the success code.
    #[error("{}", describe_exit(.code))]
    ExitStatus { code: Option<i32> },

    /// The run was terminated on request. `started` is false when the
    /// encode process was never spawned, so no output was written.
    #[error("Conversion cancelled")]
    Cancelled { started: bool },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("Encoder exited with code {}", code),
        None => "Encoder terminated by signal".to_string(),
    }
}

impl EncoderError {
    pub fn missing_encoder(path: impl Into<PathBuf>) -> Self {
        Self::MissingEncoder { path: path.into() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the encoder may have left a partial output file.
    pub fn left_partial_output(&self) -> bool {
        matches!(self, Self::Cancelled { started: true })
    }
}
