//! Offline question synthesis from lesson text.
//!
//! Each question is built from one paragraph: its most frequent keyword is
//! the answer, the next ones are distractors, and the options are shuffled.
//! No network access, so it is free and always available.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::chunker::{self, truncate_chars};
use crate::keywords::{self, DEFAULT_TOP_K};
use crate::question::{GeneratedQuestion, CHOICE_COUNT};

/// Longest paragraph excerpt quoted in a prompt.
pub const EXCERPT_CHARS: usize = 160;

/// Sampling attempts before falling back to placeholder distractors.
const MAX_BACKFILL_ATTEMPTS: usize = 16;

/// Answer used when a paragraph has no usable keyword at all.
const FALLBACK_TOPIC: &str = "concept";

/// Filler distractors for keyword-poor paragraphs.
const PLACEHOLDERS: &[&str] = &[
    "term", "concept", "idea", "process", "element", "principle", "method",
];

/// Generates exactly `count` questions from `text`.
///
/// Paragraphs are reused cyclically when `count` exceeds them. Output order
/// and option order depend on `rng`; the shape of each question does not.
pub fn generate_local<R: Rng + ?Sized>(
    text: &str,
    count: usize,
    paragraph_chars: usize,
    rng: &mut R,
) -> Vec<GeneratedQuestion> {
    let paragraphs = chunker::paragraphs(text, paragraph_chars);
    debug!(
        "Local generation: {} paragraphs for {} questions",
        paragraphs.len(),
        count
    );

    (0..count)
        .filter_map(|i| {
            let paragraph = if paragraphs.is_empty() {
                text
            } else {
                paragraphs[i % paragraphs.len()].as_str()
            };
            synthesize(paragraph, rng)
        })
        .collect()
}

/// Builds one question from one paragraph.
///
/// Options are distinct lowercase words and the prompt is never blank, so
/// `None` only signals a broken keyword or placeholder table.
fn synthesize<R: Rng + ?Sized>(paragraph: &str, rng: &mut R) -> Option<GeneratedQuestion> {
    let kws = keywords::keywords(paragraph, DEFAULT_TOP_K);
    let topic = kws
        .first()
        .cloned()
        .unwrap_or_else(|| FALLBACK_TOPIC.to_string());
    let distractors = pick_distractors(&topic, &kws, rng);

    let mut options: Vec<String> = distractors;
    options.push(topic.clone());
    options.shuffle(rng);

    let answer_index = options.iter().position(|o| *o == topic).unwrap_or(0);
    let choices: Vec<String> = options.iter().map(|o| capitalize(o)).collect();

    let excerpt = truncate_chars(paragraph, EXCERPT_CHARS);
    let prompt = format!(
        "In the context of: \"{}\", which term best fits the topic?",
        excerpt
    );

    GeneratedQuestion::new(prompt, choices, answer_index)
        .map_err(|reason| warn!("Dropped a local question: {}", reason))
        .ok()
}

/// Three distractors, distinct from each other and from `topic`.
///
/// Takes the keywords ranked just below the topic, then samples the
/// keyword set for more, then falls back to placeholder words.
fn pick_distractors<R: Rng + ?Sized>(topic: &str, kws: &[String], rng: &mut R) -> Vec<String> {
    let needed = CHOICE_COUNT - 1;
    let mut distractors: Vec<String> = kws
        .iter()
        .filter(|k| k.as_str() != topic)
        .take(needed)
        .cloned()
        .collect();

    let mut attempts = 0;
    while distractors.len() < needed && attempts < MAX_BACKFILL_ATTEMPTS && !kws.is_empty() {
        attempts += 1;
        let extra = &kws[rng.gen_range(0..kws.len())];
        if extra != topic && !distractors.contains(extra) {
            distractors.push(extra.clone());
        }
    }

    for placeholder in PLACEHOLDERS {
        if distractors.len() >= needed {
            break;
        }
        if *placeholder != topic && !distractors.iter().any(|d| d == placeholder) {
            distractors.push(placeholder.to_string());
        }
    }

    distractors
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::DEFAULT_PARAGRAPH_CHARS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LESSON: &str = "Photosynthesis converts light energy into chemical energy. \
        Plants use chlorophyll to absorb light. The process occurs in chloroplasts.";

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_exact_count() {
        for count in [0, 1, 5, 13] {
            let qs = generate_local(LESSON, count, DEFAULT_PARAGRAPH_CHARS, &mut rng());
            assert_eq!(qs.len(), count);
        }
    }

    #[test]
    fn test_shape_invariant() {
        let text = "Mitochondria produce energy. ".repeat(40) + "Ribosomes build proteins from amino acids.";
        for seed in 0..20 {
            let mut r = StdRng::seed_from_u64(seed);
            for q in generate_local(&text, 8, DEFAULT_PARAGRAPH_CHARS, &mut r) {
                assert_eq!(q.choices().len(), 4);
                assert!(q.answer_index() <= 3);
                assert!(!q.prompt().trim().is_empty());
            }
        }
    }

    #[test]
    fn test_topic_is_most_frequent_keyword() {
        // "light" and "energy" both occur twice; "light" is seen first.
        let qs = generate_local(LESSON, 1, DEFAULT_PARAGRAPH_CHARS, &mut rng());
        assert_eq!(qs[0].answer(), "Light");
        let expected = ["Light", "Energy", "Photosynthesis", "Converts"];
        for choice in qs[0].choices() {
            assert!(expected.contains(&choice.as_str()), "unexpected choice {choice}");
        }
    }

    #[test]
    fn test_paragraphs_reused_cyclically() {
        let text = format!("{} {}", "Alpha alpha beta gamma delta. ".repeat(10), "Omega omega sigma tau rho.");
        let paras = chunker::paragraphs(&text, DEFAULT_PARAGRAPH_CHARS);
        assert_eq!(paras.len(), 2);

        let qs = generate_local(&text, 4, DEFAULT_PARAGRAPH_CHARS, &mut rng());
        assert_eq!(qs[0].answer(), "Alpha");
        assert_eq!(qs[1].answer(), "Omega");
        assert_eq!(qs[2].answer(), "Alpha");
        assert_eq!(qs[3].answer(), "Omega");
    }

    #[test]
    fn test_keyword_poor_text_gets_placeholders() {
        let qs = generate_local("Osmosis.", 3, DEFAULT_PARAGRAPH_CHARS, &mut rng());
        for q in &qs {
            assert_eq!(q.answer(), "Osmosis");
            assert_eq!(q.choices().len(), 4);
        }
    }

    #[test]
    fn test_empty_text_still_well_formed() {
        let qs = generate_local("", 2, DEFAULT_PARAGRAPH_CHARS, &mut rng());
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].answer(), "Concept");
    }

    #[test]
    fn test_prompt_excerpt_is_bounded() {
        let long = "word ".repeat(200);
        let qs = generate_local(&long, 1, 10_000, &mut rng());
        let prompt = qs[0].prompt();
        let quoted = prompt.split('"').nth(1).unwrap();
        assert!(quoted.chars().count() <= EXCERPT_CHARS);
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = generate_local(LESSON, 3, DEFAULT_PARAGRAPH_CHARS, &mut StdRng::seed_from_u64(99));
        let b = generate_local(LESSON, 3, DEFAULT_PARAGRAPH_CHARS, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cell"), "Cell");
        assert_eq!(capitalize(""), "");
    }
}
