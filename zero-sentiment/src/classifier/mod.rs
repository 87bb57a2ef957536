//! Financial text classifiers.
//!
//! A classifier maps raw text to probabilities over the fixed
//! positive/negative/neutral label schema. Input length limits belong to the
//! classifier, not to its callers.

pub mod huggingface;

use async_trait::async_trait;

use crate::error::ClassifierError;
use crate::types::ClassProbabilities;

pub use huggingface::HuggingFaceClassifier;

/// Text classifier over the positive/negative/neutral schema.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Classifier name for logging
    fn name(&self) -> &str;

    /// Maximum input length the classifier accepts; longer input is truncated.
    fn max_length(&self) -> usize;

    /// Classify `text`. Probabilities sum to 1 within tolerance.
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ClassifierError>;
}

/// Whitespace words kept for a model limited to `max_tokens` subword tokens:
/// at most two tokens per word.
pub fn word_budget(max_tokens: usize) -> usize {
    (max_tokens / 2).max(1)
}

/// Keep at most `max_words` whitespace-separated words.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("a b  c\nd", 3), "a b c");
        assert_eq!(truncate_words("short", 512), "short");
        assert_eq!(truncate_words("   ", 10), "");
    }

    #[test]
    fn test_word_budget_stays_below_token_limit() {
        assert_eq!(word_budget(512), 256);
        assert_eq!(word_budget(1), 1);
        assert!(word_budget(128) < 128);
    }
}
