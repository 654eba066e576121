//! Trait definitions for the encoder module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::{mpsc, watch};

use super::error::EncoderError;
use crate::command::EncoderInvocation;

/// Executes encoder invocations as external processes.
#[async_trait]
pub trait EncoderRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Checks that the encoder binary is usable.
    async fn validate(&self, program: &Path) -> Result<(), EncoderError>;

    /// Runs a probe invocation and returns the source duration in seconds,
    /// or `None` when the output carries no duration.
    async fn probe_duration(&self, invocation: &EncoderInvocation)
        -> Result<Option<f64>, EncoderError>;

    /// Runs an encode invocation to completion.
    ///
    /// Every output line is sent to `lines` in emission order. Setting
    /// `cancel` to `true` terminates the process and yields
    /// [`EncoderError::Cancelled`], with `started` set once the process was
    /// spawned.
    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        lines: mpsc::Sender<String>,
        cancel: watch::Receiver<bool>,
    ) -> Result<(), EncoderError>;
}

/// Resolves once `cancel` reads `true`. Never resolves if the sender is
/// dropped without cancelling.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
