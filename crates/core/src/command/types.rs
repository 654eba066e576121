//! Types for encoder command construction.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Extension of the output container (Matroska).
pub const CONTAINER_EXTENSION: &str = "mkv";

/// Target resolution. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// Keep the source resolution.
    #[default]
    #[serde(rename = "original")]
    Original,
    /// Downscale to fit 1920x1080.
    #[serde(rename = "1080p")]
    P1080,
    /// Downscale to fit 1280x720.
    #[serde(rename = "720p")]
    P720,
}

impl Resolution {
    /// Bounding box as (width, height), `None` for the source resolution.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::P1080 => Some((1920, 1080)),
            Self::P720 => Some((1280, 720)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            other => Err(format!("unknown resolution: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Audio encoding profile. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioProfile {
    /// AAC at 192 kbps, plays everywhere.
    #[default]
    Aac,
    /// Opus at 128 kbps, smaller at the same perceived quality.
    Opus,
}

impl AudioProfile {
    /// ffmpeg encoder name.
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "libopus",
        }
    }

    /// ffmpeg bitrate argument.
    pub fn bitrate(&self) -> &'static str {
        match self {
            Self::Aac => "192k",
            Self::Opus => "128k",
        }
    }
}

impl FromStr for AudioProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aac" => Ok(Self::Aac),
            "opus" | "libopus" => Ok(Self::Opus),
            other => Err(format!("unknown audio profile: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for AudioProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Constant-quality value handed to the encoder's `-cq` parameter.
///
/// Always within [`Quality::MIN`, `Quality::MAX`]; out-of-range inputs are
/// clamped on construction and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 25;
    pub const MAX: u8 = 45;
    pub const DEFAULT: u8 = 34;

    /// Creates a quality value, clamping into the supported range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::new)
    }
}

/// Checks that a custom output name is a bare file name, so the output
/// stays inside the `Converted` folder. Blank names pass.
pub fn check_output_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.contains(['/', '\\']) {
        return Err(format!("output name must not contain a path separator: {}", name));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (None, _) | (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(format!("output name must be a plain file name: {}", name)),
    }
}

/// Normalizes a custom output name.
///
/// Blank names and names rejected by [`check_output_name`] yield `None`.
/// Trailing container extensions are stripped (case-insensitive) and
/// exactly one is appended.
pub fn normalize_output_name(name: &str) -> Option<String> {
    check_output_name(name).ok()?;
    let mut base = name.trim();
    let suffix = format!(".{}", CONTAINER_EXTENSION);
    while base.len() >= suffix.len()
        && base.is_char_boundary(base.len() - suffix.len())
        && base[base.len() - suffix.len()..].eq_ignore_ascii_case(&suffix)
    {
        base = base[..base.len() - suffix.len()].trim_end();
    }

    if base.is_empty() {
        None
    } else {
        Some(format!("{}{}", base, suffix))
    }
}

/// Options snapshot applied to every file of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub audio: AudioProfile,
    #[serde(default)]
    pub quality: Quality,
    /// Normalized custom output file name (with extension).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_name: Option<String>,
}

impl ConversionOptions {
    pub fn new(
        resolution: Resolution,
        audio: AudioProfile,
        quality: Quality,
        output_name: Option<&str>,
    ) -> Self {
        Self {
            resolution,
            audio,
            quality,
            output_name: output_name.and_then(normalize_output_name),
        }
    }

    /// Replaces the custom output name.
    pub fn with_output_name(mut self, name: Option<&str>) -> Self {
        self.output_name = name.and_then(normalize_output_name);
        self
    }

    /// Normalized custom output file name, if any.
    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    /// Re-applies normalization, for options built through deserialization.
    pub fn normalized(self) -> Self {
        let name = self.output_name.clone();
        self.with_output_name(name.as_deref())
    }
}

/// A fully constructed encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    /// Encoder binary.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Exit code that signals success.
    pub success_code: i32,
}

impl EncoderInvocation {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            success_code: 0,
        }
    }

    /// Renders the invocation as a single command line for logging.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
