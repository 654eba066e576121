pub mod command;
pub mod config;
pub mod encoder;
pub mod language;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod subtitles;
pub mod testing;

pub use command::{
    check_output_name, AudioProfile, CommandBuilder, ConversionOptions, EncoderInvocation, Quality,
    Resolution,
};
pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, Config, ConfigError,
};
pub use encoder::{EncoderError, EncoderRunner, FfmpegRunner};
pub use language::{detect_language, Language};
pub use pipeline::{
    BatchHandle, BatchSummary, ConversionPipeline, EnqueueOutcome, EventEnvelope, ItemStatus,
    LogLevel, PipelineError, PipelineEvent, QueueItem,
};
pub use progress::{classify_line, LineClass, ProgressEvent, ProgressTracker};
pub use subtitles::{find_matches, SubtitleMatch};
