//! Prometheus metrics for the conversion pipeline.
//!
//! The server registers these through [`all_metrics`] alongside its own
//! HTTP and WebSocket metrics.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

/// Conversions finished, by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("av1batch_conversions_total", "Total file conversions"),
        &["result"], // "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Wall-clock duration of a single file conversion.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "av1batch_conversion_duration_seconds",
            "Duration of a single file conversion",
        )
        .buckets(vec![
            10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 14400.0,
        ]),
        &["result"],
    )
    .unwrap()
});

/// Companion subtitles attached per conversion.
pub static SUBTITLES_ATTACHED: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "av1batch_subtitles_attached",
            "Number of subtitle tracks attached per conversion",
        )
        .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0]),
    )
    .unwrap()
});

/// Batches started.
pub static BATCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("av1batch_batches_started_total", "Total batches started").unwrap()
});

/// Start requests rejected, by reason.
pub static BATCH_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "av1batch_batch_rejections_total",
            "Batch start requests rejected",
        ),
        &["reason"], // "already_running", "empty_queue", "missing_encoder"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(SUBTITLES_ATTACHED.clone()),
        Box::new(BATCHES_STARTED.clone()),
        Box::new(BATCH_REJECTIONS.clone()),
    ]
}
