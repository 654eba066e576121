//! Subtitle language detection from file names.
//!
//! Detection is purely name-based: the file name is lowercased and tested
//! against an ordered list of whole-word tokens. The first token that matches
//! decides the language, so the declaration order below is also the
//! tie-break when a name carries more than one recognizable token.
//!
//! Word boundaries are ASCII-only: a non-ASCII letter such as `ñ` or `é`
//! counts as a separator, so `ñes.srt` matches the `es` token.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages recognized in subtitle file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    Japanese,
    Chinese,
    Korean,
    Russian,
    Arabic,
}

impl Language {
    /// ISO 639-2 (bibliographic) code written into the stream metadata.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "eng",
            Self::Spanish => "spa",
            Self::French => "fre",
            Self::German => "ger",
            Self::Italian => "ita",
            Self::Portuguese => "por",
            Self::Japanese => "jpn",
            Self::Chinese => "chi",
            Self::Korean => "kor",
            Self::Russian => "rus",
            Self::Arabic => "ara",
        }
    }

    /// Human-readable track title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
            Self::Korean => "Korean",
            Self::Russian => "Russian",
            Self::Arabic => "Arabic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Tokens per language, in priority order.
const TOKENS: &[(Language, &[&str])] = &[
    (Language::English, &["eng", "en", "english"]),
    (Language::Spanish, &["spa", "es", "spanish", "español"]),
    (Language::French, &["fre", "fra", "fr", "french"]),
    (Language::German, &["ger", "deu", "de", "german"]),
    (Language::Italian, &["ita", "it", "italian"]),
    (Language::Portuguese, &["por", "pt", "portuguese"]),
    (Language::Japanese, &["jpn", "ja", "japanese"]),
    (Language::Chinese, &["chi", "zh", "chinese"]),
    (Language::Korean, &["kor", "ko", "korean"]),
    (Language::Russian, &["rus", "ru", "russian"]),
    (Language::Arabic, &["ara", "ar", "arabic"]),
];

static PATTERNS: Lazy<Vec<(Regex, Language)>> = Lazy::new(|| {
    TOKENS
        .iter()
        .flat_map(|(language, tokens)| {
            tokens.iter().filter_map(move |token| {
                Regex::new(&format!(r"\b{}\b", token))
                    .ok()
                    .map(|re| (re, *language))
            })
        })
        .collect()
});

/// Detects the subtitle language from a file name.
///
/// Falls back to [`Language::English`] when no token matches.
pub fn detect_language(filename: &str) -> Language {
    let lower = filename.to_lowercase();
    PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, language)| *language)
        .unwrap_or_default()
}
