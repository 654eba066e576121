//! Companion subtitle discovery.
//!
//! Subtitles are matched by folder co-location and file name only:
//!
//! - A folder holding a single video hands every `.srt` file to that video.
//! - A folder holding several videos only hands over `.srt` files whose stem
//!   contains the video's stem (case-insensitive), so subtitles are never
//!   cross-assigned between episodes sharing a folder.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::language::{detect_language, Language};

/// Video container extensions recognized as queueable media.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm"];

/// Subtitle extensions picked up as companions.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt"];

/// A subtitle file resolved for a video, with its detected language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleMatch {
    /// Path to the subtitle file.
    pub path: PathBuf,
    /// Detected language.
    pub language: Language,
}

impl SubtitleMatch {
    /// Creates a match, detecting the language from the file name.
    pub fn detect(path: PathBuf) -> Self {
        let language = path
            .file_name()
            .map(|name| detect_language(&name.to_string_lossy()))
            .unwrap_or_default();
        Self { path, language }
    }

    /// ISO 639-2 code of the detected language.
    pub fn code(&self) -> &'static str {
        self.language.code()
    }

    /// Display title of the detected language.
    pub fn title(&self) -> &'static str {
        self.language.title()
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Whether the path has a recognized video extension.
pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

/// Whether the path has a recognized subtitle extension.
pub fn is_subtitle_file(path: &Path) -> bool {
    has_extension(path, SUBTITLE_EXTENSIONS)
}

fn lower_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Lists the regular files of `dir` accepted by `filter`, sorted by file name.
fn list_files(dir: &Path, filter: fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if filter(&path) && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Lists the recognized video files in a folder.
pub fn list_videos(dir: &Path) -> io::Result<Vec<PathBuf>> {
    list_files(dir, is_video_file)
}

/// Selects the companion subtitles of `video` among the files of its folder.
///
/// `videos` and `subtitles` are the folder's video and subtitle files; the
/// returned order follows `subtitles`.
pub fn select_companions(
    video: &Path,
    videos: &[PathBuf],
    subtitles: &[PathBuf],
) -> Vec<SubtitleMatch> {
    if videos.len() == 1 {
        return subtitles
            .iter()
            .cloned()
            .map(SubtitleMatch::detect)
            .collect();
    }

    let video_stem = lower_stem(video);
    subtitles
        .iter()
        .filter(|sub| lower_stem(sub).contains(&video_stem))
        .cloned()
        .map(SubtitleMatch::detect)
        .collect()
}

/// Finds the companion subtitles of a video in its parent folder.
pub fn find_matches(video: &Path) -> io::Result<Vec<SubtitleMatch>> {
    let dir = match video.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let subtitles = list_files(dir, is_subtitle_file)?;
    if subtitles.is_empty() {
        return Ok(Vec::new());
    }

    let videos = list_videos(dir)?;
    Ok(select_companions(video, &videos, &subtitles))
}
