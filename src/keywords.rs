//! Frequency-based keyword extraction for a single paragraph.
//!
//! Each distinct non-stop word is scored by how often it occurs. Ranking is
//! by score descending; equal scores keep the order in which the words first
//! appear in the paragraph, so the same paragraph always yields the same
//! ranking.

use std::collections::HashMap;

use crate::tokenizer;

/// Default number of keywords pulled from a paragraph.
pub const DEFAULT_TOP_K: usize = 6;

/// A scored vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermScore {
    pub term: String,
    pub frequency: usize,
    /// Token position of the first occurrence; the tie-break key.
    pub first_seen: usize,
}

/// Score every distinct non-stop term in `paragraph`.
///
/// The result is fully ordered: frequency descending, then first occurrence
/// ascending.
pub fn score_terms(paragraph: &str) -> Vec<TermScore> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut scores: Vec<TermScore> = Vec::new();

    for (position, word) in tokenizer::content_words(paragraph).into_iter().enumerate() {
        match index.get(&word) {
            Some(&slot) => scores[slot].frequency += 1,
            None => {
                index.insert(word.clone(), scores.len());
                scores.push(TermScore {
                    term: word,
                    frequency: 1,
                    first_seen: position,
                });
            }
        }
    }

    scores.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(a.first_seen.cmp(&b.first_seen))
    });
    scores
}

/// Return up to `k` keywords from `paragraph`, best first.
///
/// Returns fewer than `k` when the paragraph has fewer distinct non-stop
/// terms.
pub fn keywords(paragraph: &str, k: usize) -> Vec<String> {
    score_terms(paragraph)
        .into_iter()
        .take(k)
        .map(|s| s.term)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_ranking() {
        let kws = keywords("enzyme substrate enzyme product enzyme substrate", 3);
        assert_eq!(kws, vec!["enzyme", "substrate", "product"]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let kws = keywords("zebra apple mango apple zebra mango", 6);
        assert_eq!(kws, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_stop_words_never_ranked() {
        let kws = keywords("the the the the cell", 6);
        assert_eq!(kws, vec!["cell"]);
    }

    #[test]
    fn test_top_k_limit() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(keywords(text, DEFAULT_TOP_K).len(), 6);
        assert_eq!(keywords(text, 2), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_empty_paragraph() {
        assert!(keywords("", DEFAULT_TOP_K).is_empty());
        assert!(score_terms("of to in").is_empty());
    }

    #[test]
    fn test_scores_report_counts() {
        let scores = score_terms("light energy light");
        assert_eq!(scores[0].term, "light");
        assert_eq!(scores[0].frequency, 2);
        assert_eq!(scores[1].first_seen, 1);
    }
}
