use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::command::{AudioProfile, ConversionOptions, Quality, Resolution};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8080
}

/// Encoder binary configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg. A bare name is looked up on `PATH`.
    #[serde(default = "default_encoder_path")]
    pub path: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            path: default_encoder_path(),
        }
    }
}

fn default_encoder_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Conversion options used when a batch is started without overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub audio: AudioProfile,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

impl DefaultsConfig {
    pub fn to_options(&self) -> ConversionOptions {
        ConversionOptions::new(
            self.resolution,
            self.audio,
            self.quality,
            self.output_name.as_deref(),
        )
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Events retained for slow subscribers before the oldest are dropped.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.encoder.path, PathBuf::from("ffmpeg"));
        assert_eq!(config.pipeline.event_buffer, 1024);
        assert_eq!(config.defaults.to_options(), ConversionOptions::default());
    }

    #[test]
    fn test_deserialize_defaults_section() {
        let toml = r#"
[defaults]
resolution = "1080p"
audio = "opus"
quality = 52
output_name = "Archive.MKV"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let options = config.defaults.to_options();
        assert_eq!(options.resolution, Resolution::P1080);
        assert_eq!(options.audio, AudioProfile::Opus);
        assert_eq!(options.quality.value(), Quality::MAX);
        assert_eq!(options.output_name(), Some("Archive.mkv"));
    }

    #[test]
    fn test_deserialize_defaults_ignore_case() {
        let toml = r#"
[defaults]
resolution = "1080P"
audio = "OPUS"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.defaults.resolution, Resolution::P1080);
        assert_eq!(config.defaults.audio, AudioProfile::Opus);
    }

    #[test]
    fn test_deserialize_unknown_resolution_fails() {
        let toml = r#"
[defaults]
resolution = "4k"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_serialize_round_trips_through_toml() {
        let mut config = Config::default();
        config.encoder.path = PathBuf::from("/opt/ffmpeg/bin/ffmpeg");
        let text = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
