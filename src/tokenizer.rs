//! Word-level tokenizer for keyword scoring.
//!
//! Lowercases the input and keeps runs that start with a letter and continue
//! with letters, hyphens or apostrophes ("cell-wall", "plant's"). Single
//! letters never match, so stray initials and list markers drop out.

use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z][a-z\-']+").expect("word pattern is valid"));

/// Common function words that never make useful answer choices.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "for", "with", "as", "by",
    "is", "are", "was", "were", "be", "been", "that", "this", "it", "at", "from", "which",
    "into", "than", "then", "so", "such", "these", "those", "can", "could", "should", "would",
    "will", "may", "might", "about", "over", "under", "between", "through", "their", "there",
    "they", "them", "his", "her", "its", "we", "you", "your", "our", "us",
];

/// Tokenize text into lowercase word tokens, in reading order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Tokenize and drop stop words.
pub fn content_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| !is_stop_word(w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokenize() {
        let tokens = tokenize("Hello, World! This is a test.");
        assert_eq!(tokens, vec!["hello", "world", "this", "is", "test"]);
    }

    #[test]
    fn test_apostrophes_and_hyphens_preserved() {
        let tokens = tokenize("don't cell-wall plant's");
        assert_eq!(tokens, vec!["don't", "cell-wall", "plant's"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(content_words("   ").is_empty());
    }

    #[test]
    fn test_numbers_are_not_words() {
        let tokens = tokenize("chapter 3.14 section 2 GPT-4");
        assert_eq!(tokens, vec!["chapter", "section", "gpt-"]);
    }

    #[test]
    fn test_stop_words_removed() {
        let words = content_words("The process occurs in the chloroplasts");
        assert_eq!(words, vec!["process", "occurs", "chloroplasts"]);
    }
}
