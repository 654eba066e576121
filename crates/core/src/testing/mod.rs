//! Testing utilities.
//!
//! [`ScriptedRunner`] stands in for the encoder so the pipeline can be
//! exercised without ffmpeg or real media.
//!
//! # Example
//!
//! ```rust,ignore
//! use av1batch_core::testing::{EncodeScript, ProbeScript, ScriptedRunner};
//!
//! let runner = ScriptedRunner::new();
//! runner
//!     .set_script("/videos/a.mp4", EncodeScript::success(120.0).with_lines(["frame=1 time=00:01:00.00"]))
//!     .await;
//! runner
//!     .set_script("/videos/b.mp4", EncodeScript::exit(1).with_probe(ProbeScript::Fail))
//!     .await;
//! ```

mod scripted_runner;

pub use scripted_runner::{
    EncodeScript, InvocationKind, ProbeScript, RecordedInvocation, ScriptedRunner,
};
