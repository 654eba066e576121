//! Sequential batch conversion over a shared work queue.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::{CommandBuilder, ConversionOptions};
use crate::encoder::{cancelled, EncoderError, EncoderRunner};
use crate::metrics::{
    BATCHES_STARTED, BATCH_REJECTIONS, CONVERSIONS_TOTAL, CONVERSION_DURATION, SUBTITLES_ATTACHED,
};
use crate::progress::{classify_line, LineClass, ProgressEvent, ProgressTracker};
use crate::subtitles::{self, SubtitleMatch};

use super::error::PipelineError;
use super::events::{EventEnvelope, LogLevel, PipelineEvent};
use super::types::{BatchSummary, EnqueueOutcome, ItemStatus, QueueItem};

/// Capacity of the per-attempt encoder line channel.
const LINE_BUFFER: usize = 256;

const BANNER: &str = "============================================================";

/// Handle to a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: Uuid,
    task: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Waits for the batch to finish.
    ///
    /// A worker that died without reporting yields an empty, stopped summary.
    pub async fn wait(self) -> BatchSummary {
        let batch_id = self.batch_id;
        self.task.await.unwrap_or_else(|e| {
            warn!(%batch_id, error = %e, "Batch worker ended abnormally");
            BatchSummary {
                stopped: true,
                ..BatchSummary::new(batch_id)
            }
        })
    }
}

/// Clears the running flag if the worker exits without releasing it.
struct RunningGuard {
    running: Arc<AtomicBool>,
    armed: bool,
}

impl RunningGuard {
    fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            armed: true,
        }
    }

    fn release(mut self) {
        self.running.store(false, Ordering::Release);
        self.armed = false;
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.armed {
            self.running.store(false, Ordering::Release);
        }
    }
}

/// Owns the work queue and drives one file at a time through the encoder.
///
/// Cloning is cheap and every clone shares the same queue, flags and event
/// channel.
pub struct ConversionPipeline<R: EncoderRunner> {
    runner: Arc<R>,
    builder: CommandBuilder,
    queue: Arc<RwLock<Vec<QueueItem>>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    current_cancel: Arc<Mutex<Option<watch::Sender<bool>>>>,
    events: broadcast::Sender<EventEnvelope>,
}

impl<R: EncoderRunner> Clone for ConversionPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            builder: self.builder.clone(),
            queue: Arc::clone(&self.queue),
            running: Arc::clone(&self.running),
            stop_requested: Arc::clone(&self.stop_requested),
            current_cancel: Arc::clone(&self.current_cancel),
            events: self.events.clone(),
        }
    }
}

impl<R: EncoderRunner + 'static> ConversionPipeline<R> {
    /// Creates a pipeline. `event_buffer` bounds how far a subscriber may
    /// lag before it starts losing the oldest events.
    pub fn new(runner: R, builder: CommandBuilder, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            runner: Arc::new(runner),
            builder,
            queue: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            current_cancel: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn command_builder(&self) -> &CommandBuilder {
        &self.builder
    }

    /// Subscribes to pipeline events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Snapshot of the queue, in order.
    pub async fn queue(&self) -> Vec<QueueItem> {
        self.queue.read().await.clone()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(EventEnvelope::now(event));
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(PipelineEvent::Log {
            level,
            message: message.into(),
        });
    }

    /// Adds a file to the tail of the queue.
    ///
    /// Relative paths are resolved against the current directory. A path
    /// already pending or in flight is left alone; a failed one is re-armed.
    pub async fn enqueue(&self, path: impl AsRef<Path>) -> EnqueueOutcome {
        let path = absolutize(path.as_ref());
        let name = display_name(&path);

        let mut queue = self.queue.write().await;
        if let Some(item) = queue.iter_mut().find(|item| item.path == path) {
            if item.status.is_failed() {
                item.status = ItemStatus::Pending;
                drop(queue);
                info!(path = %path.display(), "Re-queued failed file");
                self.emit(PipelineEvent::Requeued { path });
                self.log(LogLevel::Info, format!("Re-queued: {}", name));
                return EnqueueOutcome::Requeued;
            }
            drop(queue);
            debug!(path = %path.display(), "Ignoring duplicate enqueue");
            self.emit(PipelineEvent::Duplicate { path });
            self.log(LogLevel::Info, format!("Already in queue: {}", name));
            return EnqueueOutcome::Duplicate;
        }

        queue.push(QueueItem::new(path.clone()));
        drop(queue);
        info!(path = %path.display(), "Enqueued file");
        self.emit(PipelineEvent::Enqueued { path });
        self.log(LogLevel::Info, format!("Added to queue: {}", name));
        EnqueueOutcome::Accepted
    }

    /// Enqueues every recognized video file in a folder (not recursive).
    pub async fn enqueue_folder(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<(PathBuf, EnqueueOutcome)>, PipelineError> {
        let dir = absolutize(dir.as_ref());
        let listing = dir.clone();
        let videos = tokio::task::spawn_blocking(move || subtitles::list_videos(&listing))
            .await
            .map_err(std::io::Error::other)??;

        let mut outcomes = Vec::with_capacity(videos.len());
        for video in videos {
            let outcome = self.enqueue(&video).await;
            outcomes.push((video, outcome));
        }

        let added = outcomes
            .iter()
            .filter(|(_, o)| *o != EnqueueOutcome::Duplicate)
            .count();
        if added > 0 {
            self.log(LogLevel::Info, format!("Added {} video(s) from folder", added));
        }
        info!(dir = %dir.display(), found = outcomes.len(), added, "Enqueued folder");
        Ok(outcomes)
    }

    /// Removes a file that is not currently being converted.
    pub async fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = absolutize(path.as_ref());
        let mut queue = self.queue.write().await;
        let Some(pos) = queue.iter().position(|item| item.path == path) else {
            return false;
        };
        if queue[pos].status.is_in_flight() {
            return false;
        }
        queue.remove(pos);
        drop(queue);
        info!(path = %path.display(), "Removed file from queue");
        self.emit(PipelineEvent::Removed { path });
        true
    }

    /// Starts a batch over the pending items.
    ///
    /// Rejected, with nothing started, when a batch is already running, when
    /// nothing is pending, or when the encoder is unusable, in that order.
    pub async fn start_batch(
        &self,
        options: ConversionOptions,
    ) -> Result<BatchHandle, PipelineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Self::reject(PipelineError::AlreadyRunning));
        }
        let guard = RunningGuard::new(Arc::clone(&self.running));

        let pending = self
            .queue
            .read()
            .await
            .iter()
            .filter(|item| item.status.is_pending())
            .count();
        if pending == 0 {
            return Err(Self::reject(PipelineError::EmptyQueue));
        }

        let program = self.builder.encoder_path().to_path_buf();
        if let Err(e) = self.runner.validate(&program).await {
            warn!(encoder = %program.display(), error = %e, "Encoder validation failed");
            return Err(Self::reject(PipelineError::MissingEncoder { path: program }));
        }

        self.stop_requested.store(false, Ordering::Release);
        let batch_id = Uuid::new_v4();
        let options = options.normalized();
        BATCHES_STARTED.inc();
        info!(%batch_id, pending, runner = self.runner.name(), "Starting batch");
        self.emit(PipelineEvent::BatchStarted {
            batch_id,
            options: options.clone(),
            pending,
        });

        let pipeline = self.clone();
        let task = tokio::spawn(async move { pipeline.run_batch(batch_id, options, guard).await });

        Ok(BatchHandle { batch_id, task })
    }

    fn reject(error: PipelineError) -> PipelineError {
        BATCH_REJECTIONS
            .with_label_values(&[error.rejection_reason()])
            .inc();
        debug!(error = %error, "Batch start rejected");
        error
    }

    /// Terminates the in-flight conversion, if any. The file is marked failed
    /// and the batch moves on.
    pub async fn cancel_current(&self) -> bool {
        match self.current_cancel.lock().await.as_ref() {
            Some(cancel) => {
                cancel.send_replace(true);
                info!("Cancellation requested for current file");
                true
            }
            None => false,
        }
    }

    /// Cancels the in-flight conversion and starts no further files.
    pub async fn stop(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.stop_requested.store(true, Ordering::Release);
        info!("Stop requested");
        self.cancel_current().await;
        true
    }

    async fn run_batch(
        self,
        batch_id: Uuid,
        options: ConversionOptions,
        guard: RunningGuard,
    ) -> BatchSummary {
        let mut summary = BatchSummary::new(batch_id);
        let mut processed = 0usize;

        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                summary.stopped = true;
                break;
            }
            let Some((path, remaining)) = self.take_next().await else {
                break;
            };
            processed += 1;
            let total = processed + remaining;

            let (cancel_tx, cancel_rx) = watch::channel(false);
            {
                let mut current = self.current_cancel.lock().await;
                // A stop that landed after the check above found no channel.
                if self.stop_requested.load(Ordering::Acquire) {
                    cancel_tx.send_replace(true);
                }
                *current = Some(cancel_tx);
            }

            let started = Instant::now();
            let result = self
                .convert_item(&path, processed, total, &options, cancel_rx)
                .await;
            self.current_cancel.lock().await.take();
            let elapsed = started.elapsed().as_secs_f64();

            match result {
                Ok(output) => {
                    self.finish_success(&path, output, elapsed).await;
                    summary.succeeded.push(path);
                }
                Err(err) => {
                    let output = CommandBuilder::output_path(&path, &options);
                    self.finish_failure(&path, &output, err, elapsed).await;
                    summary.failed.push(path);
                }
            }
        }

        guard.release();
        self.emit(PipelineEvent::Progress(ProgressEvent::reset()));
        self.log(LogLevel::Info, BANNER);
        self.log(
            LogLevel::Info,
            if summary.stopped {
                "Batch stopped"
            } else {
                "All conversions complete!"
            },
        );
        self.log(LogLevel::Info, BANNER);
        info!(
            %batch_id,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            stopped = summary.stopped,
            "Batch completed"
        );
        self.emit(PipelineEvent::BatchCompleted {
            batch_id,
            succeeded: summary.succeeded.len(),
            failed: summary.failed.len(),
            stopped: summary.stopped,
        });
        summary
    }

    /// Marks the first pending item as probing and returns it along with the
    /// number of items still pending behind it.
    async fn take_next(&self) -> Option<(PathBuf, usize)> {
        let mut queue = self.queue.write().await;
        let pos = queue.iter().position(|item| item.status.is_pending())?;
        queue[pos].status = ItemStatus::Probing;
        let remaining = queue[pos + 1..]
            .iter()
            .filter(|item| item.status.is_pending())
            .count();
        Some((queue[pos].path.clone(), remaining))
    }

    async fn set_status(&self, path: &Path, status: ItemStatus) {
        let mut queue = self.queue.write().await;
        if let Some(item) = queue.iter_mut().find(|item| item.path == path) {
            item.status = status;
        }
    }

    async fn convert_item(
        &self,
        path: &Path,
        index: usize,
        total: usize,
        options: &ConversionOptions,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<PathBuf, EncoderError> {
        let name = display_name(path);
        info!(path = %path.display(), index, total, "Converting file");
        self.emit(PipelineEvent::ItemStarted {
            index,
            total,
            path: path.to_path_buf(),
        });
        self.log(LogLevel::Info, BANNER);
        self.log(
            LogLevel::Info,
            format!("Converting {}/{}: {}", index, total, name),
        );
        self.log(LogLevel::Info, BANNER);

        let video = path.to_path_buf();
        let matches = tokio::task::spawn_blocking(move || subtitles::find_matches(&video))
            .await
            .map_err(std::io::Error::other)??;
        self.log_subtitles(&matches);
        SUBTITLES_ATTACHED.observe(matches.len() as f64);

        tokio::fs::create_dir_all(CommandBuilder::output_dir(path)).await?;

        let encode = self.builder.build_encode(path, &matches, options);
        let probe = self.builder.build_probe(path);
        self.log(LogLevel::Info, format!("Command: {}", encode.display()));

        let probed = tokio::select! {
            result = self.runner.probe_duration(&probe) => result,
            _ = cancelled(&mut cancel) => return Err(EncoderError::Cancelled { started: false }),
        };
        let duration = match probed {
            Ok(Some(secs)) => secs,
            Ok(None) => {
                warn!(path = %path.display(), "Probe reported no duration");
                self.log(
                    LogLevel::Warning,
                    "Could not determine duration; progress will not be reported",
                );
                0.0
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Duration probe failed");
                self.log(
                    LogLevel::Warning,
                    format!("Duration probe failed ({}); progress will not be reported", e),
                );
                0.0
            }
        };

        self.set_status(path, ItemStatus::Encoding).await;
        let tracker = ProgressTracker::new(duration);
        let (lines_tx, mut lines_rx) = mpsc::channel(LINE_BUFFER);

        let run = self.runner.encode(&encode, lines_tx, cancel);
        tokio::pin!(run);
        let result = loop {
            tokio::select! {
                biased;
                Some(line) = lines_rx.recv() => self.handle_line(&tracker, &line),
                result = &mut run => break result,
            }
        };
        // The runner has returned; its sender is gone once buffered lines drain.
        while let Some(line) = lines_rx.recv().await {
            self.handle_line(&tracker, &line);
        }
        result?;

        Ok(CommandBuilder::output_path(path, options))
    }

    fn log_subtitles(&self, matches: &[SubtitleMatch]) {
        if matches.is_empty() {
            self.log(LogLevel::Info, "No subtitle files found");
            return;
        }
        let names: Vec<String> = matches
            .iter()
            .map(|m| format!("{} ({})", display_name(&m.path), m.title()))
            .collect();
        self.log(
            LogLevel::Info,
            format!(
                "Found {} subtitle file(s): {}",
                matches.len(),
                names.join(", ")
            ),
        );
    }

    fn handle_line(&self, tracker: &ProgressTracker, line: &str) {
        if let Some(progress) = tracker.observe(line) {
            self.emit(PipelineEvent::Progress(progress));
        }
        match classify_line(line) {
            LineClass::Keep => self.log(LogLevel::Info, line),
            LineClass::Drop => debug!(line, "encoder"),
        }
    }

    async fn finish_success(&self, path: &Path, output: PathBuf, elapsed: f64) {
        self.queue.write().await.retain(|item| item.path != path);

        CONVERSIONS_TOTAL.with_label_values(&["succeeded"]).inc();
        CONVERSION_DURATION
            .with_label_values(&["succeeded"])
            .observe(elapsed);
        info!(path = %path.display(), output = %output.display(), elapsed_secs = elapsed, "Conversion succeeded");

        self.emit(PipelineEvent::Progress(ProgressEvent::complete()));
        self.log(
            LogLevel::Info,
            format!("Successfully converted: {}", display_name(&output)),
        );
        self.emit(PipelineEvent::ItemSucceeded {
            path: path.to_path_buf(),
            output,
        });
    }

    async fn finish_failure(&self, path: &Path, output: &Path, err: EncoderError, elapsed: f64) {
        let result = if err.is_cancelled() {
            // Only an encode that actually ran can have truncated the output;
            // a file at that path otherwise belongs to an earlier run.
            if err.left_partial_output() {
                match tokio::fs::remove_file(output).await {
                    Ok(()) => debug!(output = %output.display(), "Removed partial output"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(output = %output.display(), error = %e, "Failed to remove partial output"),
                }
            }
            "cancelled"
        } else {
            "failed"
        };

        let reason = err.to_string();
        self.set_status(
            path,
            ItemStatus::Failed {
                reason: reason.clone(),
            },
        )
        .await;

        CONVERSIONS_TOTAL.with_label_values(&[result]).inc();
        CONVERSION_DURATION.with_label_values(&[result]).observe(elapsed);
        warn!(path = %path.display(), reason = %reason, "Conversion failed");

        self.log(LogLevel::Error, format!("ERROR: {}", reason));
        self.emit(PipelineEvent::ItemFailed {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Resolves a path against the current directory without touching the
/// filesystem.
fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
