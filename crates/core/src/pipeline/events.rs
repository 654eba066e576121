//! Events broadcast by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::command::ConversionOptions;
use crate::progress::ProgressEvent;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Something observable happened in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Enqueued {
        path: PathBuf,
    },
    Duplicate {
        path: PathBuf,
    },
    Requeued {
        path: PathBuf,
    },
    Removed {
        path: PathBuf,
    },
    BatchStarted {
        batch_id: Uuid,
        options: ConversionOptions,
        pending: usize,
    },
    ItemStarted {
        /// 1-based position within the batch.
        index: usize,
        /// Files processed so far plus files still pending.
        total: usize,
        path: PathBuf,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Progress(ProgressEvent),
    ItemSucceeded {
        path: PathBuf,
        output: PathBuf,
    },
    ItemFailed {
        path: PathBuf,
        reason: String,
    },
    BatchCompleted {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        stopped: bool,
    },
}

impl PipelineEvent {
    /// Stable name of the variant, as used for the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Duplicate { .. } => "duplicate",
            Self::Requeued { .. } => "requeued",
            Self::Removed { .. } => "removed",
            Self::BatchStarted { .. } => "batch_started",
            Self::ItemStarted { .. } => "item_started",
            Self::Log { .. } => "log",
            Self::Progress(_) => "progress",
            Self::ItemSucceeded { .. } => "item_succeeded",
            Self::ItemFailed { .. } => "item_failed",
            Self::BatchCompleted { .. } => "batch_completed",
        }
    }
}

/// A timestamped event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

impl EventEnvelope {
    pub fn now(event: PipelineEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
