//! Word completion for the typing keyboard.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::GazeError;
use crate::layout::SUGGESTION_SLOTS;

/// Source of completion candidates for partially typed text.
pub trait SuggestionSource {
    /// Up to four candidates, best first. Fewer is fine.
    fn suggest(&mut self, partial: &str) -> Result<Vec<String>, GazeError>;
}

const COMMON_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "am", "and", "any", "are", "arm", "back", "bad",
    "bath", "bathroom", "bed", "better", "blanket", "breakfast", "but", "call", "can", "cold",
    "come", "could", "day", "dinner", "do", "doctor", "don't", "door", "down", "drink", "eat",
    "family", "fan", "feel", "feeling", "fine", "for", "friend", "from", "get", "give", "go",
    "good", "goodbye", "have", "he", "head", "hello", "help", "her", "here", "hi", "him", "home",
    "hot", "how", "hungry", "hurt", "I", "I'm", "in", "is", "it", "it's", "just", "know", "leg",
    "light", "like", "love", "lunch", "me", "medicine", "more", "morning", "my", "need", "night",
    "no", "not", "now", "nurse", "of", "off", "ok", "on", "open", "out", "pain", "please",
    "pillow", "read", "rest", "right", "see", "she", "should", "sit", "sleep", "slowly", "so",
    "sorry", "stop", "talk", "tea", "tell", "thank", "thanks", "that", "the", "there", "they",
    "thirsty", "time", "tired", "to", "today", "toilet", "tomorrow", "turn", "up", "very",
    "wait", "want", "warm", "was", "watch", "water", "we", "what", "when", "where", "who",
    "why", "window", "with", "would", "yes", "you",
];

/// Sorted word list matched by case-insensitive prefix.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: BTreeSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(COMMON_WORDS.iter().copied())
    }
}

impl Vocabulary {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// One word per line; blank lines and `#` comments are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list {}", path.display()))?;
        let vocab = Self::new(text.lines().filter(|l| !l.trim_start().starts_with('#')));
        if vocab.is_empty() {
            anyhow::bail!("Word list {} is empty", path.display());
        }
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words starting with `prefix`, ignoring case, shortest first then alphabetical.
    pub fn complete(&self, prefix: &str, limit: usize) -> Vec<String> {
        let needle = prefix.to_lowercase();
        let mut hits: Vec<&String> = self
            .words
            .iter()
            .filter(|w| w.to_lowercase().starts_with(&needle))
            .collect();
        hits.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        hits.into_iter().take(limit).cloned().collect()
    }
}

/// Token currently being typed: everything after the last whitespace.
pub fn last_token(text: &str) -> &str {
    text.rsplit(char::is_whitespace).next().unwrap_or("")
}

impl SuggestionSource for Vocabulary {
    fn suggest(&mut self, partial: &str) -> Result<Vec<String>, GazeError> {
        let token = last_token(partial);
        if token.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.complete(token, SUGGESTION_SLOTS))
    }
}
