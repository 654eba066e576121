//! Encoder output parsing: progress extraction and log classification.

mod lines;

pub use lines::LineReader;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::command::hms_to_secs;

static TIME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"time=(\d+):(\d+):(\d+\.\d+)").ok());

/// Markers that make an encoder line worth surfacing to the log.
const LOG_MARKERS: &[&str] = &["error", "warning", "frame=", "speed="];

/// Fractional progress of the current encode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completed fraction in [0.0, 1.0].
    pub fraction: f64,
    /// Completed percentage in [0, 100].
    pub percent: u8,
}

impl ProgressEvent {
    /// Builds an event from a fraction, clamping into [0, 1].
    pub fn from_fraction(fraction: f64) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self {
            fraction,
            percent: (fraction * 100.0).floor() as u8,
        }
    }

    pub fn complete() -> Self {
        Self::from_fraction(1.0)
    }

    pub fn reset() -> Self {
        Self::from_fraction(0.0)
    }
}

/// Whether an encoder output line is surfaced to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Keep,
    Drop,
}

/// Classifies an encoder line: errors, warnings and status lines are kept,
/// everything else is codec chatter.
pub fn classify_line(line: &str) -> LineClass {
    let lower = line.to_lowercase();
    if LOG_MARKERS.iter().any(|marker| lower.contains(marker)) {
        LineClass::Keep
    } else {
        LineClass::Drop
    }
}

/// Extracts the elapsed encode time (`time=HH:MM:SS.ff`) in seconds.
pub fn parse_elapsed(line: &str) -> Option<f64> {
    let re = TIME_RE.as_ref()?;
    let caps = re.captures(line)?;
    hms_to_secs(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())
}

/// Turns encoder status lines into progress events for a single attempt.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    total_secs: f64,
}

impl ProgressTracker {
    /// Creates a tracker for a known total duration; zero or negative means
    /// unknown, in which case no events are produced.
    pub fn new(total_secs: f64) -> Self {
        Self { total_secs }
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    pub fn has_duration(&self) -> bool {
        self.total_secs > 0.0
    }

    /// Observes one output line.
    pub fn observe(&self, line: &str) -> Option<ProgressEvent> {
        if !self.has_duration() {
            return None;
        }
        let elapsed = parse_elapsed(line)?;
        Some(ProgressEvent::from_fraction(elapsed / self.total_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str =
        "frame=  240 fps= 48 q=30.0 size=    1024kB time=00:00:30.00 bitrate= 279.6kbits/s speed=2.0x";

    #[test]
    fn test_parse_elapsed() {
        assert_eq!(parse_elapsed(STATUS), Some(30.0));
        assert_eq!(parse_elapsed("time=01:00:01.50"), Some(3601.5));
        assert_eq!(parse_elapsed("time=N/A"), None);
        assert_eq!(parse_elapsed("Stream mapping:"), None);
    }

    #[test]
    fn test_progress_fraction_and_percent() {
        let tracker = ProgressTracker::new(120.0);
        let event = tracker.observe(STATUS).unwrap();
        assert!((event.fraction - 0.25).abs() < 1e-9);
        assert_eq!(event.percent, 25);

        let event = tracker.observe("time=00:01:59.99").unwrap();
        assert_eq!(event.percent, 99);
    }

    #[test]
    fn test_progress_clamps_past_duration() {
        let tracker = ProgressTracker::new(10.0);
        let event = tracker.observe("time=00:00:12.00").unwrap();
        assert_eq!(event.fraction, 1.0);
        assert_eq!(event.percent, 100);
    }

    #[test]
    fn test_unknown_duration_emits_nothing() {
        let tracker = ProgressTracker::new(0.0);
        assert!(!tracker.has_duration());
        assert_eq!(tracker.observe(STATUS), None);
    }

    #[test]
    fn test_line_without_timestamp_emits_nothing() {
        let tracker = ProgressTracker::new(60.0);
        assert_eq!(tracker.observe("Press [q] to stop"), None);
    }

    #[test]
    fn test_from_fraction_clamps() {
        assert_eq!(ProgressEvent::from_fraction(-0.5), ProgressEvent::reset());
        assert_eq!(ProgressEvent::from_fraction(7.0), ProgressEvent::complete());
        assert_eq!(ProgressEvent::from_fraction(f64::NAN).fraction, 0.0);
        assert_eq!(ProgressEvent::from_fraction(0.999).percent, 99);
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line(STATUS), LineClass::Keep);
        assert_eq!(classify_line("[aac @ 0x1] Warning: too many bits"), LineClass::Keep);
        assert_eq!(classify_line("Error opening input file"), LineClass::Keep);
        assert_eq!(classify_line("  Stream #0:0: Video: h264"), LineClass::Drop);
        assert_eq!(classify_line("  libavutil      58. 29.100"), LineClass::Drop);
    }
}
