//! Utterances, translation results, and the session history list

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::language::Language;

/// One unit of recognized speech being accumulated for translation
///
/// Created on the first transcript update of a listening session, mutated in
/// place as partial text arrives, and finalized exactly once before
/// translation starts.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Unique utterance ID
    pub id: Uuid,
    /// Language the speech was captured in
    pub language: Language,
    /// Latest recognized text (partial until finalized)
    pub raw_text: String,
    /// Whether the utterance has been finalized
    pub is_final: bool,
}

impl Utterance {
    /// Start a new utterance in `language`
    #[must_use]
    pub fn new(language: Language) -> Self {
        Self {
            id: Uuid::new_v4(),
            language,
            raw_text: String::new(),
            is_final: false,
        }
    }

    /// Replace the text with a newer partial transcript
    ///
    /// Ignored after finalization; partials arriving late must not mutate a
    /// submitted utterance.
    pub fn update(&mut self, text: &str) {
        if !self.is_final {
            self.raw_text = text.to_string();
        }
    }

    /// Mark the utterance complete, returning the finalized text
    ///
    /// Idempotent: a second call returns the same text without mutation.
    pub fn finalize(&mut self) -> &str {
        self.is_final = true;
        self.raw_text.trim()
    }

    /// Whether the accumulated text is blank
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// A completed translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    /// Finalized source utterance text
    pub source_text: String,
    /// Language the utterance was spoken in
    pub source_language: Language,
    /// Translated text
    pub target_text: String,
    /// Language of the translation
    pub target_language: Language,
    /// When the translation completed
    pub created_at: DateTime<Utc>,
}

/// Most-recent-first list of completed translations
///
/// Retention is explicit: `Some(cap)` evicts the oldest entries beyond the
/// cap, `None` grows without bound and leaves truncation to the display
/// layer.
#[derive(Debug, Default)]
pub struct TranslationHistory {
    entries: VecDeque<TranslationResult>,
    retention: Option<usize>,
}

impl TranslationHistory {
    /// Create a history with the given retention policy
    #[must_use]
    pub const fn new(retention: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    /// Prepend a result, evicting the oldest entries beyond the cap
    pub fn push(&mut self, result: TranslationResult) {
        self.entries.push_front(result);
        if let Some(cap) = self.retention {
            while self.entries.len() > cap {
                self.entries.pop_back();
            }
        }
    }

    /// Entries, most recent first
    #[must_use]
    pub fn entries(&self) -> impl Iterator<Item = &TranslationResult> {
        self.entries.iter()
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry, if any
    #[must_use]
    pub fn latest(&self) -> Option<&TranslationResult> {
        self.entries.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: usize) -> TranslationResult {
        TranslationResult {
            source_text: format!("source {n}"),
            source_language: Language::English,
            target_text: format!("target {n}"),
            target_language: Language::Mandarin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_utterance_updates_until_final() {
        let mut utt = Utterance::new(Language::English);
        utt.update("hel");
        utt.update("hello");
        assert_eq!(utt.raw_text, "hello");

        let text = utt.finalize().to_string();
        assert_eq!(text, "hello");

        // Late partials must not mutate a finalized utterance
        utt.update("hello there");
        assert_eq!(utt.raw_text, "hello");
    }

    #[test]
    fn test_finalize_trims_whitespace() {
        let mut utt = Utterance::new(Language::English);
        utt.update("  hello  ");
        assert_eq!(utt.finalize(), "hello");
    }

    #[test]
    fn test_blank_utterance() {
        let mut utt = Utterance::new(Language::English);
        assert!(utt.is_blank());
        utt.update("   ");
        assert!(utt.is_blank());
        utt.update("x");
        assert!(!utt.is_blank());
    }

    #[test]
    fn test_history_most_recent_first() {
        let mut history = TranslationHistory::new(None);
        history.push(result(1));
        history.push(result(2));

        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().source_text, "source 2");
    }

    #[test]
    fn test_history_retention_evicts_oldest() {
        let mut history = TranslationHistory::new(Some(2));
        history.push(result(1));
        history.push(result(2));
        history.push(result(3));

        assert_eq!(history.len(), 2);
        let texts: Vec<_> = history.entries().map(|r| r.source_text.clone()).collect();
        assert_eq!(texts, vec!["source 3", "source 2"]);
    }

    #[test]
    fn test_unbounded_history() {
        let mut history = TranslationHistory::new(None);
        for n in 0..100 {
            history.push(result(n));
        }
        assert_eq!(history.len(), 100);
    }
}
