//! Utterance classification
//!
//! Decides whether a transcribed utterance is a send-confirmation phrase
//! ("send it", "yes", "looks good") or more message content.

use serde::Serialize;

/// Utterances shorter than this many characters may confirm with a bare word.
pub const DEFAULT_SHORT_UTTERANCE_MAX_CHARS: usize = 20;

/// Confirmation words that only count when the whole utterance is short.
const CONFIRMATION_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "send", "confirm", "ok", "okay", "sure", "correct",
];

/// Confirmation phrases that also count when they lead a longer utterance.
const LEAD_PHRASES: &[&str] = &[
    "send it",
    "send that",
    "send the message",
    "send message",
    "that's it",
    "that is it",
    "looks good",
    "go ahead",
    "confirm it",
    "yes send",
    "yes, send",
];

/// Outcome of classifying one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_confirmation: bool,
}

/// Phrase-list classifier for confirmation utterances.
///
/// Matching is substring/prefix based and therefore fuzzy: a short
/// utterance such as "yes I'm late" still reads as a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceClassifier {
    short_utterance_max_chars: usize,
}

impl Default for UtteranceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_UTTERANCE_MAX_CHARS)
    }
}

impl UtteranceClassifier {
    pub fn new(short_utterance_max_chars: usize) -> Self {
        Self {
            short_utterance_max_chars,
        }
    }

    pub fn short_utterance_max_chars(&self) -> usize {
        self.short_utterance_max_chars
    }

    /// Classify an utterance.
    ///
    /// A confirmation needs all of: an existing candidate message, a short
    /// utterance or one that begins with a lead phrase, and at least one
    /// confirmation phrase somewhere in the text.
    pub fn classify(&self, utterance: &str, has_candidate_message: bool) -> Classification {
        if !has_candidate_message {
            return Classification {
                is_confirmation: false,
            };
        }

        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return Classification {
                is_confirmation: false,
            };
        }

        let is_short = normalized.chars().count() < self.short_utterance_max_chars;
        let leads_with_phrase = LEAD_PHRASES
            .iter()
            .any(|phrase| starts_with_phrase(&normalized, phrase));
        let mentions_phrase = CONFIRMATION_WORDS
            .iter()
            .chain(LEAD_PHRASES)
            .any(|phrase| normalized.contains(phrase));

        Classification {
            is_confirmation: (is_short || leads_with_phrase) && mentions_phrase,
        }
    }
}

/// Trim, lower-case and unify apostrophes.
fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase().replace('\u{2019}', "'")
}

/// Prefix match that does not split a word ("send iterations" is not "send it").
fn starts_with_phrase(text: &str, phrase: &str) -> bool {
    match text.strip_prefix(phrase) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}
