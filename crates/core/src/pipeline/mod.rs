//! Conversion pipeline: the work queue and the sequential batch worker.
//!
//! Each batch takes the first pending item, resolves its companion
//! subtitles, probes its duration, runs the encoder and records the
//! outcome before moving to the next one. A failed file never stops the
//! batch.
//!
//! ```text
//! Pending -> Probing -> Encoding -> removed (success)
//!                                \-> Failed { reason }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use av1batch_core::command::{CommandBuilder, ConversionOptions};
//! use av1batch_core::encoder::FfmpegRunner;
//! use av1batch_core::pipeline::ConversionPipeline;
//!
//! let pipeline = ConversionPipeline::new(FfmpegRunner::new(), CommandBuilder::new("ffmpeg"), 1024);
//! let mut events = pipeline.subscribe();
//!
//! pipeline.enqueue("/videos/holiday.mp4").await;
//! let handle = pipeline.start_batch(ConversionOptions::default()).await?;
//!
//! while let Ok(envelope) = events.recv().await {
//!     println!("{:?}", envelope.event);
//! }
//! let summary = handle.wait().await;
//! ```

mod conversion;
mod error;
mod events;
mod types;

pub use conversion::{BatchHandle, ConversionPipeline};
pub use error::PipelineError;
pub use events::{EventEnvelope, LogLevel, PipelineEvent};
pub use types::{BatchSummary, EnqueueOutcome, ItemStatus, QueueItem};
