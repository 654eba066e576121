//! Encoder process execution.
//!
//! [`EncoderRunner`] is the seam between the pipeline and the external
//! encoder. [`FfmpegRunner`] spawns real processes; tests use
//! [`crate::testing::ScriptedRunner`].

mod error;
mod ffmpeg;
mod traits;

pub use error::EncoderError;
pub use ffmpeg::FfmpegRunner;
pub use traits::EncoderRunner;

pub(crate) use traits::cancelled;
