//! Subprocess-backed runner for ffmpeg.

use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::error::EncoderError;
use super::traits::{cancelled, EncoderRunner};
use crate::command::{parse_duration, EncoderInvocation};
use crate::progress::LineReader;

/// Runs invocations with `tokio::process`, reading the encoder's stderr.
///
/// ffmpeg writes both its banner and its status line to stderr; stdout is
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn(invocation: &EncoderInvocation) -> Result<(Child, ChildStderr), EncoderError> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::missing_encoder(&invocation.program)
                } else {
                    EncoderError::Spawn(e)
                }
            })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            EncoderError::Io(std::io::Error::other("encoder stderr was not captured"))
        })?;
        Ok((child, stderr))
    }

    fn check_status(status: ExitStatus, invocation: &EncoderInvocation) -> Result<(), EncoderError> {
        match status.code() {
            Some(code) if code == invocation.success_code => Ok(()),
            code => Err(EncoderError::ExitStatus { code }),
        }
    }
}

/// Forwards every line of `stderr` to `lines`. A closed receiver does not
/// stop the pump, so the pipe keeps draining until the process exits.
async fn pump_lines(stderr: ChildStderr, lines: &mpsc::Sender<String>) -> std::io::Result<()> {
    let mut reader = LineReader::new(BufReader::new(stderr));
    while let Some(line) = reader.next_line().await? {
        if !lines.is_closed() {
            let _ = lines.send(line).await;
        }
    }
    Ok(())
}

#[async_trait]
impl EncoderRunner for FfmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn validate(&self, program: &Path) -> Result<(), EncoderError> {
        // Explicit paths must exist; bare names are resolved on PATH by the OS.
        if program.components().count() > 1 {
            if program.is_file() {
                return Ok(());
            }
            return Err(EncoderError::missing_encoder(program));
        }

        match Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EncoderError::missing_encoder(program))
            }
            Err(e) => Err(EncoderError::Spawn(e)),
        }
    }

    async fn probe_duration(
        &self,
        invocation: &EncoderInvocation,
    ) -> Result<Option<f64>, EncoderError> {
        let (mut child, stderr) = Self::spawn(invocation)?;
        let mut reader = LineReader::new(BufReader::new(stderr));

        while let Some(line) = reader.next_line().await? {
            if let Some(secs) = parse_duration(&line) {
                // The header is all we need; skip decoding the whole file.
                let _ = child.kill().await;
                debug!(duration_secs = secs, "Probe found duration");
                return Ok(Some(secs));
            }
        }

        let status = child.wait().await?;
        debug!(code = ?status.code(), "Probe finished without a duration");
        Ok(None)
    }

    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        lines: mpsc::Sender<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), EncoderError> {
        if *cancel.borrow() {
            return Err(EncoderError::Cancelled { started: false });
        }

        let (mut child, stderr) = Self::spawn(invocation)?;

        let outcome = tokio::select! {
            result = async {
                pump_lines(stderr, &lines).await?;
                child.wait().await
            } => Some(result),
            _ = cancelled(&mut cancel) => None,
        };

        match outcome {
            Some(Ok(status)) => Self::check_status(status, invocation),
            Some(Err(e)) => {
                let _ = child.kill().await;
                Err(EncoderError::Io(e))
            }
            None => {
                let _ = child.kill().await;
                Err(EncoderError::Cancelled { started: true })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes a shell script standing in for the encoder. It is run through
    /// `/bin/sh` so the test never execs a file it just wrote.
    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-ffmpeg.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn sh(script: &Path) -> EncoderInvocation {
        EncoderInvocation::new(
            PathBuf::from("/bin/sh"),
            vec![script.to_string_lossy().to_string()],
        )
    }

    async fn collect(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = rx.recv().await {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_encode_streams_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = script(
            &dir,
            "printf 'Input #0\\n' >&2\n\
             printf 'frame=1 time=00:00:01.00\\rframe=2 time=00:00:02.00\\r' >&2\n\
             printf 'done\\n' >&2\n",
        );
        let (tx, rx) = mpsc::channel(16);
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let result = FfmpegRunner::new().encode(&sh(&path), tx, cancel_rx).await;
        assert!(result.is_ok());
        assert_eq!(
            collect(rx).await,
            vec![
                "Input #0",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "done",
            ]
        );
    }

    #[tokio::test]
    async fn test_encode_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo 'Error opening input' >&2\nexit 3\n");
        let (tx, rx) = mpsc::channel(16);
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let err = FfmpegRunner::new()
            .encode(&sh(&path), tx, cancel_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::ExitStatus { code: Some(3) }));
        assert_eq!(collect(rx).await, vec!["Error opening input"]);
    }

    #[tokio::test]
    async fn test_encode_cancel_terminates_process() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo 'frame=1' >&2\nexec sleep 30\n");
        let (tx, mut rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let invocation = sh(&path);
        let task = tokio::spawn(async move {
            FfmpegRunner::new().encode(&invocation, tx, cancel_rx).await
        });

        assert_eq!(rx.recv().await.as_deref(), Some("frame=1"));
        cancel_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("cancel should end the encode promptly")
            .unwrap();
        assert!(matches!(
            result,
            Err(EncoderError::Cancelled { started: true })
        ));
    }

    #[tokio::test]
    async fn test_encode_already_cancelled_never_spawns() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("spawned");
        let path = script(&dir, &format!("touch '{}'\n", marker.display()));
        let (tx, _rx) = mpsc::channel(1);
        let (_cancel_tx, cancel_rx) = watch::channel(true);

        let err = FfmpegRunner::new()
            .encode(&sh(&path), tx, cancel_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::Cancelled { started: false }));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_encode_missing_binary() {
        let invocation = EncoderInvocation::new(PathBuf::from("/nonexistent/ffmpeg"), vec![]);
        let (tx, _rx) = mpsc::channel(1);
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let err = FfmpegRunner::new()
            .encode(&invocation, tx, cancel_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::MissingEncoder { .. }));
    }

    #[tokio::test]
    async fn test_probe_reads_duration() {
        let dir = TempDir::new().unwrap();
        let path = script(
            &dir,
            "echo 'Input #0, matroska' >&2\n\
             echo '  Duration: 00:01:40.00, start: 0.000000' >&2\n\
             exec sleep 30\n",
        );

        let probe = tokio::time::timeout(
            Duration::from_secs(5),
            FfmpegRunner::new().probe_duration(&sh(&path)),
        )
        .await
        .expect("probe should stop at the duration line")
        .unwrap();
        assert_eq!(probe, Some(100.0));
    }

    #[tokio::test]
    async fn test_probe_without_duration() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "echo 'Invalid data found' >&2\nexit 1\n");
        let probe = FfmpegRunner::new().probe_duration(&sh(&path)).await.unwrap();
        assert_eq!(probe, None);
    }

    #[tokio::test]
    async fn test_validate() {
        let runner = FfmpegRunner::new();
        assert!(runner.validate(Path::new("/bin/sh")).await.is_ok());
        assert!(matches!(
            runner.validate(Path::new("/nonexistent/ffmpeg")).await,
            Err(EncoderError::MissingEncoder { .. })
        ));
        assert!(matches!(
            runner.validate(Path::new("av1batch-no-such-encoder")).await,
            Err(EncoderError::MissingEncoder { .. })
        ));
    }
}
