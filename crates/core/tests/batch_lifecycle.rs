//! Batch lifecycle integration tests.
//!
//! These drive the public pipeline API with a scripted encoder:
//! - Event ordering across a whole batch
//! - Continue-on-error semantics
//! - Enqueue, re-run and output layout on disk
//! - Cancelling before the encoder starts

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use av1batch_core::{
    testing::{EncodeScript, InvocationKind, ProbeScript, ScriptedRunner},
    CommandBuilder, ConversionOptions, ConversionPipeline, EventEnvelope, ItemStatus,
    PipelineError, PipelineEvent,
};

/// Test helper bundling a pipeline, its runner and a media folder.
struct TestHarness {
    pipeline: ConversionPipeline<ScriptedRunner>,
    runner: ScriptedRunner,
    events: broadcast::Receiver<EventEnvelope>,
    media: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let runner = ScriptedRunner::new();
        let pipeline =
            ConversionPipeline::new(runner.clone(), CommandBuilder::new("/opt/ffmpeg"), 4096);
        let events = pipeline.subscribe();
        let media = TempDir::new().expect("Failed to create media dir");
        Self {
            pipeline,
            runner,
            events,
            media,
        }
    }

    fn touch(&self, name: &str) -> PathBuf {
        let path = self.media.path().join(name);
        std::fs::write(&path, b"").expect("Failed to create media file");
        path
    }

    fn drain_events(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = self.events.try_recv() {
            events.push(envelope.event);
        }
        events
    }
}

fn kinds(events: &[PipelineEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(PipelineEvent::kind)
        .filter(|kind| *kind != "log" && *kind != "progress")
        .collect()
}

fn converted(dir: &Path, name: &str) -> PathBuf {
    dir.join("Converted").join(name)
}

#[tokio::test]
async fn test_full_batch_event_sequence() {
    let mut h = TestHarness::new();
    let a = h.touch("a.mp4");
    let b = h.touch("b.mkv");
    let c = h.touch("c.avi");
    h.runner.set_script(&b, EncodeScript::exit(1)).await;

    h.pipeline.enqueue(&a).await;
    h.pipeline.enqueue(&b).await;
    h.pipeline.enqueue(&c).await;

    let summary = h
        .pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(summary.succeeded, vec![a.clone(), c.clone()]);
    assert_eq!(summary.failed, vec![b.clone()]);
    assert!(!summary.stopped);

    let events = h.drain_events();
    assert_eq!(
        kinds(&events),
        vec![
            "enqueued",
            "enqueued",
            "enqueued",
            "batch_started",
            "item_started",
            "item_succeeded",
            "item_started",
            "item_failed",
            "item_started",
            "item_succeeded",
            "batch_completed",
        ]
    );
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::BatchCompleted {
            succeeded: 2,
            failed: 1,
            stopped: false,
            ..
        })
    ));

    // Only the failed file stays behind.
    let queue = h.pipeline.queue().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].path, b);
    assert!(queue[0].status.is_failed());
    assert!(!h.pipeline.is_running());
}

#[tokio::test]
async fn test_every_file_is_probed_before_encode() {
    let h = TestHarness::new();
    let a = h.touch("a.mp4");
    let b = h.touch("b.mp4");
    h.runner
        .set_script(&a, EncodeScript::success(30.0).with_probe(ProbeScript::NoDuration))
        .await;

    h.pipeline.enqueue(&a).await;
    h.pipeline.enqueue(&b).await;
    h.pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;

    let recorded = h.runner.recorded().await;
    let kinds: Vec<InvocationKind> = recorded.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            InvocationKind::Probe,
            InvocationKind::Encode,
            InvocationKind::Probe,
            InvocationKind::Encode,
        ]
    );
    assert!(recorded
        .iter()
        .all(|r| r.invocation.program == Path::new("/opt/ffmpeg")));
}

#[tokio::test]
async fn test_outputs_land_in_converted_folder() {
    let h = TestHarness::new();
    let a = h.touch("Holiday.mp4");

    h.pipeline.enqueue(&a).await;
    let summary = h
        .pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(summary.succeeded.len(), 1);

    let output = converted(h.media.path(), "Holiday_AV1.mkv");
    assert!(output.is_file());
    let encodes = h.runner.encodes().await;
    assert_eq!(
        encodes[0].args.last().map(String::as_str),
        output.to_str()
    );
}

#[tokio::test]
async fn test_companion_subtitles_in_shared_folder() {
    let h = TestHarness::new();
    let a = h.touch("Show.S01E01.mkv");
    let b = h.touch("Show.S01E02.mkv");
    h.touch("Show.S01E01.en.srt");
    h.touch("Show.S01E02.french.srt");

    h.pipeline.enqueue(&a).await;
    h.pipeline.enqueue(&b).await;
    h.pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;

    let encodes = h.runner.encodes().await;
    assert_eq!(encodes.len(), 2);

    let first = encodes[0].args.join(" ");
    assert!(first.contains("Show.S01E01.en.srt"));
    assert!(!first.contains("S01E02.french"));
    assert!(first.contains("language=eng"));

    let second = encodes[1].args.join(" ");
    assert!(second.contains("Show.S01E02.french.srt"));
    assert!(second.contains("language=fre"));
    assert!(second.contains("title=French"));
}

#[tokio::test]
async fn test_rerun_after_failure() {
    let mut h = TestHarness::new();
    let a = h.touch("a.mp4");
    h.runner.set_script(&a, EncodeScript::exit(2)).await;

    h.pipeline.enqueue(&a).await;
    h.pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;
    assert!(matches!(
        h.pipeline.queue().await[0].status,
        ItemStatus::Failed { .. }
    ));

    // Nothing pending until the operator re-enqueues the file.
    let err = h
        .pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyQueue));

    h.runner.set_script(&a, EncodeScript::success(60.0)).await;
    h.drain_events();
    h.pipeline.enqueue(&a).await;
    let summary = h
        .pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(summary.succeeded, vec![a]);
    assert!(h.pipeline.queue().await.is_empty());
    assert_eq!(kinds(&h.drain_events())[0], "requeued");
}

#[tokio::test]
async fn test_cancel_while_probing_keeps_previous_output() {
    let mut h = TestHarness::new();
    let a = h.touch("a.mp4");
    let previous = converted(h.media.path(), "a_AV1.mkv");
    std::fs::create_dir_all(previous.parent().unwrap()).unwrap();
    std::fs::write(&previous, b"earlier conversion").unwrap();
    h.runner
        .set_script(
            &a,
            EncodeScript::success(60.0).with_probe_delay(Duration::from_secs(30)),
        )
        .await;

    h.pipeline.enqueue(&a).await;
    let handle = h
        .pipeline
        .start_batch(ConversionOptions::default())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.runner.recorded().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("probe never started");
    assert_eq!(h.pipeline.queue().await[0].status, ItemStatus::Probing);

    assert!(h.pipeline.cancel_current().await);
    let summary = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancel should interrupt the probe");

    assert_eq!(summary.failed, vec![a]);
    assert_eq!(std::fs::read(&previous).unwrap(), b"earlier conversion");
    assert!(h.runner.encodes().await.is_empty());
    assert!(kinds(&h.drain_events()).contains(&"item_failed"));
}

#[tokio::test]
async fn test_event_envelopes_serialize_with_type_tag() {
    let mut h = TestHarness::new();
    let a = h.touch("a.mp4");
    h.pipeline.enqueue(&a).await;

    let envelope = h.events.recv().await.unwrap();
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["type"], "enqueued");
    assert_eq!(json["path"], a.to_str().unwrap());
    assert!(json["timestamp"].is_string());
}
