//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle state of a queued file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for a batch to pick it up.
    Pending,
    /// Duration probe and command preparation in progress.
    Probing,
    /// Encoder running.
    Encoding,
    /// Last attempt failed; stays queued until re-enqueued or removed.
    Failed { reason: String },
}

impl ItemStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Probing | Self::Encoding)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A file in the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Absolute path of the source file.
    pub path: PathBuf,
    pub status: ItemStatus,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            status: ItemStatus::Pending,
            enqueued_at: Utc::now(),
        }
    }
}

/// Result of an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Appended to the queue.
    Accepted,
    /// Already pending or in flight; nothing changed.
    Duplicate,
    /// A failed item was re-armed to pending.
    Requeued,
}

/// Final tally of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Whether the batch ended on a stop request.
    pub stopped: bool,
}

impl BatchSummary {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            stopped: false,
        }
    }
}
