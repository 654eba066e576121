//! Encoder command-line construction.
//!
//! The encode invocation combines the source video with one extra input per
//! companion subtitle, so the argument order matters: inputs first, then
//! codec settings, then explicit stream maps (input `0` provides video and
//! audio, input `k` provides subtitle `k`), then per-output-stream metadata
//! indexed by the subtitle's position among the *output* subtitle streams.

mod types;

pub use types::{
    check_output_name, normalize_output_name, AudioProfile, ConversionOptions, EncoderInvocation,
    Quality, Resolution, CONTAINER_EXTENSION,
};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

use crate::subtitles::SubtitleMatch;

/// Hardware AV1 encoder.
pub const VIDEO_CODEC: &str = "av1_nvenc";

/// Slowest/highest-quality NVENC preset.
pub const VIDEO_PRESET: &str = "p7";

/// Folder created next to each source for converted output.
pub const OUTPUT_DIR_NAME: &str = "Converted";

/// Suffix appended to the source stem for default output names.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_AV1";

static DURATION_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Duration: (\d+):(\d+):(\d+\.\d+)").ok());

/// Builds encoder invocations for a configured encoder binary.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    encoder_path: PathBuf,
}

impl CommandBuilder {
    pub fn new(encoder_path: impl Into<PathBuf>) -> Self {
        Self {
            encoder_path: encoder_path.into(),
        }
    }

    pub fn encoder_path(&self) -> &Path {
        &self.encoder_path
    }

    /// Output folder for a source file: `<source folder>/Converted`.
    pub fn output_dir(input: &Path) -> PathBuf {
        input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(OUTPUT_DIR_NAME)
    }

    /// Output file for a source file under the given options.
    ///
    /// Always inside [`Self::output_dir`]; a custom name that is not a bare
    /// file name falls back to the default name.
    pub fn output_path(input: &Path, options: &ConversionOptions) -> PathBuf {
        let custom = options
            .output_name()
            .filter(|name| !name.is_empty() && check_output_name(name).is_ok());
        let file_name = match custom {
            Some(name) => name.to_string(),
            None => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("{}{}.{}", stem, DEFAULT_OUTPUT_SUFFIX, CONTAINER_EXTENSION)
            }
        };
        Self::output_dir(input).join(file_name)
    }

    /// Builds the encode invocation.
    pub fn build_encode(
        &self,
        input: &Path,
        subtitles: &[SubtitleMatch],
        options: &ConversionOptions,
    ) -> EncoderInvocation {
        let output = Self::output_path(input, options);

        let mut args = vec!["-i".to_string(), input.to_string_lossy().to_string()];

        for sub in subtitles {
            args.extend(["-i".to_string(), sub.path.to_string_lossy().to_string()]);
        }

        args.extend([
            "-c:v".to_string(),
            VIDEO_CODEC.to_string(),
            "-preset".to_string(),
            VIDEO_PRESET.to_string(),
            "-cq".to_string(),
            options.quality.to_string(),
        ]);

        if let Some((width, height)) = options.resolution.dimensions() {
            args.extend([
                "-vf".to_string(),
                format!(
                    "scale={}:{}:force_original_aspect_ratio=decrease",
                    width, height
                ),
            ]);
        }

        args.extend([
            "-c:a".to_string(),
            options.audio.codec().to_string(),
            "-b:a".to_string(),
            options.audio.bitrate().to_string(),
        ]);

        args.extend(["-c:s".to_string(), "copy".to_string()]);

        args.extend([
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "0:a".to_string(),
        ]);
        for input_index in 1..=subtitles.len() {
            args.extend(["-map".to_string(), format!("{}:0", input_index)]);
        }

        for (stream_index, sub) in subtitles.iter().enumerate() {
            let key = format!("-metadata:s:s:{}", stream_index);
            args.extend([
                key.clone(),
                format!("language={}", sub.code()),
                key,
                format!("title={}", sub.title()),
            ]);
        }

        args.extend(["-y".to_string(), output.to_string_lossy().to_string()]);

        EncoderInvocation::new(self.encoder_path.clone(), args)
    }

    /// Builds the duration probe invocation (decode to the null muxer).
    pub fn build_probe(&self, input: &Path) -> EncoderInvocation {
        EncoderInvocation::new(
            self.encoder_path.clone(),
            vec![
                "-i".to_string(),
                input.to_string_lossy().to_string(),
                "-f".to_string(),
                "null".to_string(),
                "-".to_string(),
            ],
        )
    }
}

/// Parses an `HH:MM:SS.ff` triple into seconds.
pub(crate) fn hms_to_secs(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let h = hours.parse::<u64>().ok()?;
    let m = minutes.parse::<u64>().ok()?;
    let s = seconds.parse::<f64>().ok()?;
    Some((h * 3600 + m * 60) as f64 + s)
}

/// Extracts the total duration in seconds from probe output.
pub fn parse_duration(output: &str) -> Option<f64> {
    let re = DURATION_RE.as_ref()?;
    let caps = re.captures(output)?;
    hms_to_secs(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())
}
