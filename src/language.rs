//! Language tags, pairs, and finalized-text detection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Minimum text length worth running detection on
const MIN_DETECT_CHARS: usize = 4;

/// Confidence floor below which a detection is treated as ambiguous
const MIN_CONFIDENCE: f64 = 0.35;

/// A supported language
///
/// The set is closed: the translation and synthesis providers are only
/// provisioned for these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Mandarin,
    Indonesian,
    Vietnamese,
    Korean,
    Japanese,
    French,
    German,
    Spanish,
    Russian,
    Italian,
}

impl Language {
    /// ISO 639-1 code used on the wire (`sourceLang` / `targetLang` / `lang`)
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Mandarin => "zh",
            Self::Indonesian => "id",
            Self::Vietnamese => "vi",
            Self::Korean => "ko",
            Self::Japanese => "ja",
            Self::French => "fr",
            Self::German => "de",
            Self::Spanish => "es",
            Self::Russian => "ru",
            Self::Italian => "it",
        }
    }

    /// Human-readable name for logs and terminal output
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Mandarin => "Chinese",
            Self::Indonesian => "Indonesian",
            Self::Vietnamese => "Vietnamese",
            Self::Korean => "Korean",
            Self::Japanese => "Japanese",
            Self::French => "French",
            Self::German => "German",
            Self::Spanish => "Spanish",
            Self::Russian => "Russian",
            Self::Italian => "Italian",
        }
    }

    /// Map a whatlang detection to a supported language, if any
    const fn from_whatlang(lang: whatlang::Lang) -> Option<Self> {
        match lang {
            whatlang::Lang::Eng => Some(Self::English),
            whatlang::Lang::Cmn => Some(Self::Mandarin),
            whatlang::Lang::Ind => Some(Self::Indonesian),
            whatlang::Lang::Vie => Some(Self::Vietnamese),
            whatlang::Lang::Kor => Some(Self::Korean),
            whatlang::Lang::Jpn => Some(Self::Japanese),
            whatlang::Lang::Fra => Some(Self::French),
            whatlang::Lang::Deu => Some(Self::German),
            whatlang::Lang::Spa => Some(Self::Spanish),
            whatlang::Lang::Rus => Some(Self::Russian),
            whatlang::Lang::Ita => Some(Self::Italian),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "zh" | "zh-cn" | "chinese" | "mandarin" => Ok(Self::Mandarin),
            "id" | "indonesian" => Ok(Self::Indonesian),
            "vi" | "vietnamese" => Ok(Self::Vietnamese),
            "ko" | "korean" => Ok(Self::Korean),
            "ja" | "japanese" => Ok(Self::Japanese),
            "fr" | "french" => Ok(Self::French),
            "de" | "german" => Ok(Self::German),
            "es" | "spanish" => Ok(Self::Spanish),
            "ru" | "russian" => Ok(Self::Russian),
            "it" | "italian" => Ok(Self::Italian),
            other => Err(Error::Config(format!("unsupported language: {other}"))),
        }
    }
}

/// The two configured languages of a session
///
/// Swappable as a unit; the controller re-orients the pair when language
/// auto-detection identifies the other member as the speaker's language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Language currently treated as the speaker's
    pub source: Language,
    /// Language translations are produced in
    pub target: Language,
}

impl LanguagePair {
    /// Create a pair
    ///
    /// # Errors
    ///
    /// Returns error if both members are the same language
    pub fn new(source: Language, target: Language) -> Result<Self> {
        if source == target {
            return Err(Error::Config(format!(
                "language pair must differ, got {source} twice"
            )));
        }
        Ok(Self { source, target })
    }

    /// Exchange source and target
    pub const fn swap(&mut self) {
        std::mem::swap(&mut self.source, &mut self.target);
    }

    /// The opposite member of the pair, if `lang` is a member
    #[must_use]
    pub fn other(&self, lang: Language) -> Option<Language> {
        if lang == self.source {
            Some(self.target)
        } else if lang == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    /// Whether `lang` is one of the two configured languages
    #[must_use]
    pub fn contains(&self, lang: Language) -> bool {
        lang == self.source || lang == self.target
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Classifies finalized text as one of the pair's languages
///
/// Returns `None` for ambiguous or too-short text so the caller keeps the
/// current orientation instead of guessing.
#[derive(Debug, Clone, Copy)]
pub struct LanguageDetector {
    pair: LanguagePair,
}

impl LanguageDetector {
    /// Create a detector constrained to a language pair
    #[must_use]
    pub const fn new(pair: LanguagePair) -> Self {
        Self { pair }
    }

    /// Best-guess language of `text`, restricted to the configured pair
    #[must_use]
    pub fn detect(&self, text: &str) -> Option<Language> {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_DETECT_CHARS {
            return None;
        }

        let info = whatlang::detect(trimmed)?;
        let lang = Language::from_whatlang(info.lang())?;

        if !self.pair.contains(lang) {
            tracing::debug!(detected = %lang, pair = %self.pair, "detection outside pair, ignoring");
            return None;
        }

        if !info.is_reliable() && info.confidence() < MIN_CONFIDENCE {
            tracing::debug!(
                detected = %lang,
                confidence = info.confidence(),
                "detection too uncertain, ignoring"
            );
            return None;
        }

        Some(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> LanguagePair {
        LanguagePair::new(Language::English, Language::Mandarin).unwrap()
    }

    #[test]
    fn test_pair_rejects_same_language() {
        assert!(LanguagePair::new(Language::English, Language::English).is_err());
    }

    #[test]
    fn test_swap_exchanges_members() {
        let mut p = pair();
        p.swap();
        assert_eq!(p.source, Language::Mandarin);
        assert_eq!(p.target, Language::English);
    }

    #[test]
    fn test_other_member() {
        let p = pair();
        assert_eq!(p.other(Language::English), Some(Language::Mandarin));
        assert_eq!(p.other(Language::Mandarin), Some(Language::English));
        assert_eq!(p.other(Language::French), None);
    }

    #[test]
    fn test_language_round_trips_through_code() {
        for lang in [Language::English, Language::Mandarin, Language::Indonesian] {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn test_detect_too_short_is_none() {
        let detector = LanguageDetector::new(pair());
        assert_eq!(detector.detect("hi"), None);
        assert_eq!(detector.detect("   "), None);
    }

    #[test]
    fn test_detect_english_sentence() {
        let detector = LanguageDetector::new(pair());
        assert_eq!(
            detector.detect("the quick brown fox jumps over the lazy dog"),
            Some(Language::English)
        );
    }

    #[test]
    fn test_detect_outside_pair_is_none() {
        let p = LanguagePair::new(Language::Mandarin, Language::Korean).unwrap();
        let detector = LanguageDetector::new(p);
        // Clearly English, but English is not a pair member
        assert_eq!(
            detector.detect("the quick brown fox jumps over the lazy dog"),
            None
        );
    }
}
