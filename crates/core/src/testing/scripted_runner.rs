//! Scripted encoder runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};

use crate::command::EncoderInvocation;
use crate::encoder::{cancelled, EncoderError, EncoderRunner};

/// How the duration probe of a file behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeScript {
    /// The probe reports this duration in seconds.
    Duration(f64),
    /// The probe runs but prints no duration.
    NoDuration,
    /// The probe cannot run.
    Fail,
}

/// Scripted behavior of one source file.
#[derive(Debug, Clone)]
pub struct EncodeScript {
    pub probe: ProbeScript,
    /// How long the probe takes before reporting.
    pub probe_delay: Option<Duration>,
    /// Output lines emitted by the encode, in order.
    pub lines: Vec<String>,
    /// Exit code reported by the encode.
    pub exit_code: i32,
    /// Block after the lines until cancelled.
    pub hang: bool,
    /// Write a placeholder output file before emitting lines.
    pub write_output: bool,
}

impl Default for EncodeScript {
    fn default() -> Self {
        Self::success(60.0)
    }
}

impl EncodeScript {
    /// A file that probes to `duration_secs` and encodes successfully.
    pub fn success(duration_secs: f64) -> Self {
        Self {
            probe: ProbeScript::Duration(duration_secs),
            probe_delay: None,
            lines: Vec::new(),
            exit_code: 0,
            hang: false,
            write_output: true,
        }
    }

    /// A file whose encode exits with `code`.
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::success(60.0)
        }
    }

    /// A file whose encode never finishes on its own.
    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::success(60.0)
        }
    }

    pub fn with_probe(mut self, probe: ProbeScript) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }
}

/// Which runner entry point received an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Probe,
    Encode,
}

/// An invocation received by the runner.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub kind: InvocationKind,
    pub invocation: EncoderInvocation,
}

/// [`EncoderRunner`] whose behavior is configured per source file.
///
/// The source file of an invocation is its first `-i` argument. Files
/// without a script use the default script, a 60 second file that encodes
/// successfully.
///
/// # Example
///
/// ```rust,ignore
/// use av1batch_core::testing::{EncodeScript, ScriptedRunner};
///
/// let runner = ScriptedRunner::new();
/// runner.set_script("/videos/b.mp4", EncodeScript::exit(1)).await;
///
/// // b.mp4 fails, every other file succeeds.
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    scripts: Arc<RwLock<HashMap<PathBuf, EncodeScript>>>,
    default_script: Arc<RwLock<EncodeScript>>,
    encoder_missing: Arc<RwLock<bool>>,
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script for a specific source file.
    pub async fn set_script(&self, path: impl AsRef<Path>, script: EncodeScript) {
        self.scripts
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), script);
    }

    /// Set the script used for files without one.
    pub async fn set_default_script(&self, script: EncodeScript) {
        *self.default_script.write().await = script;
    }

    /// Make [`EncoderRunner::validate`] report a missing encoder.
    pub async fn set_encoder_missing(&self, missing: bool) {
        *self.encoder_missing.write().await = missing;
    }

    /// Get all recorded invocations.
    pub async fn recorded(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the recorded encode invocations.
    pub async fn encodes(&self) -> Vec<EncoderInvocation> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|r| r.kind == InvocationKind::Encode)
            .map(|r| r.invocation.clone())
            .collect()
    }

    async fn record(&self, kind: InvocationKind, invocation: &EncoderInvocation) {
        self.invocations.write().await.push(RecordedInvocation {
            kind,
            invocation: invocation.clone(),
        });
    }

    async fn script_for(&self, invocation: &EncoderInvocation) -> EncodeScript {
        if let Some(path) = source_of(invocation) {
            if let Some(script) = self.scripts.read().await.get(&path) {
                return script.clone();
            }
        }
        self.default_script.read().await.clone()
    }
}

fn source_of(invocation: &EncoderInvocation) -> Option<PathBuf> {
    let pos = invocation.args.iter().position(|a| a == "-i")?;
    invocation.args.get(pos + 1).map(PathBuf::from)
}

#[async_trait]
impl EncoderRunner for ScriptedRunner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn validate(&self, program: &Path) -> Result<(), EncoderError> {
        if *self.encoder_missing.read().await {
            return Err(EncoderError::missing_encoder(program));
        }
        Ok(())
    }

    async fn probe_duration(
        &self,
        invocation: &EncoderInvocation,
    ) -> Result<Option<f64>, EncoderError> {
        self.record(InvocationKind::Probe, invocation).await;
        let script = self.script_for(invocation).await;
        if let Some(delay) = script.probe_delay {
            tokio::time::sleep(delay).await;
        }
        match script.probe {
            ProbeScript::Duration(secs) => Ok(Some(secs)),
            ProbeScript::NoDuration => Ok(None),
            ProbeScript::Fail => Err(EncoderError::Io(std::io::Error::other(
                "scripted probe failure",
            ))),
        }
    }

    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        lines: mpsc::Sender<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), EncoderError> {
        self.record(InvocationKind::Encode, invocation).await;
        let script = self.script_for(invocation).await;

        if *cancel.borrow() {
            return Err(EncoderError::Cancelled { started: false });
        }

        if script.write_output {
            if let Some(output) = invocation.args.last() {
                tokio::fs::write(output, b"scripted output").await?;
            }
        }

        for line in script.lines {
            if lines.send(line).await.is_err() {
                break;
            }
        }

        if script.hang {
            cancelled(&mut cancel).await;
            return Err(EncoderError::Cancelled { started: true });
        }

        if script.exit_code == invocation.success_code {
            Ok(())
        } else {
            Err(EncoderError::ExitStatus {
                code: Some(script.exit_code),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(input: &str, output: &Path) -> EncoderInvocation {
        EncoderInvocation::new(
            PathBuf::from("ffmpeg"),
            vec![
                "-i".to_string(),
                input.to_string(),
                "-y".to_string(),
                output.to_string_lossy().to_string(),
            ],
        )
    }

    #[tokio::test]
    async fn test_scripts_are_selected_by_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.mkv");
        let runner = ScriptedRunner::new();
        runner
            .set_script("/v/a.mp4", EncodeScript::exit(2).with_probe(ProbeScript::NoDuration))
            .await;

        assert_eq!(runner.probe_duration(&invocation("/v/a.mp4", &out)).await.unwrap(), None);
        assert_eq!(
            runner.probe_duration(&invocation("/v/b.mp4", &out)).await.unwrap(),
            Some(60.0)
        );

        let (tx, _rx) = mpsc::channel(4);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let err = runner
            .encode(&invocation("/v/a.mp4", &out), tx, cancel_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::ExitStatus { code: Some(2) }));
        assert!(out.exists());

        assert_eq!(runner.recorded().await.len(), 3);
        assert_eq!(runner.encodes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_hang_waits_for_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.mkv");
        let runner = ScriptedRunner::new();
        runner.set_default_script(EncodeScript::hang().with_lines(["frame=1"])).await;

        let (tx, mut rx) = mpsc::channel(4);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let inv = invocation("/v/a.mp4", &out);
        let task = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.encode(&inv, tx, cancel_rx).await })
        };

        assert_eq!(rx.recv().await.as_deref(), Some("frame=1"));
        cancel_tx.send(true).unwrap();
        assert!(matches!(
            task.await.unwrap(),
            Err(EncoderError::Cancelled { started: true })
        ));
    }

    #[tokio::test]
    async fn test_missing_encoder() {
        let runner = ScriptedRunner::new();
        assert!(runner.validate(Path::new("ffmpeg")).await.is_ok());
        runner.set_encoder_missing(true).await;
        assert!(matches!(
            runner.validate(Path::new("ffmpeg")).await,
            Err(EncoderError::MissingEncoder { .. })
        ));
    }
}
