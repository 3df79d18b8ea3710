use std::path::PathBuf;
use std::str::FromStr;

use crate::billing::{ModelPricing, PRICING_4O_MINI};
use crate::chunker::DEFAULT_PARAGRAPH_CHARS;
use crate::llm::{RemoteOptions, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_MODEL_CHAR_LIMIT, DEFAULT_TEMPERATURE};
use crate::ocr::{DEFAULT_OCR_LANGUAGE, DEFAULT_OCR_SCALE};
use crate::pdf::{ExtractionBudget, DEFAULT_CHAR_LIMIT, DEFAULT_PAGE_LIMIT};

/// Runtime settings, read from the environment (and `.env`, loaded by the
/// binary before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub extraction: ExtractionBudget,
    pub ocr_scale: f32,
    pub ocr_language: String,
    pub paragraph_chars: usize,
    pub remote: RemoteOptions,
    pub pricing: ModelPricing,
    pub state_path: PathBuf,
    pub quiz_dir: PathBuf,
    pub user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionBudget::default(),
            ocr_scale: DEFAULT_OCR_SCALE,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            paragraph_chars: DEFAULT_PARAGRAPH_CHARS,
            remote: RemoteOptions::default(),
            pricing: PRICING_4O_MINI,
            state_path: PathBuf::from(".lesson_quiz/state.json"),
            quiz_dir: PathBuf::from(".lesson_quiz/quizzes"),
            user: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparsable or non-positive
    /// numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RemoteOptions::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let page_limit: u32 = positive(&lookup, "PAGE_LIMIT", DEFAULT_PAGE_LIMIT);
        let char_limit: usize = positive(&lookup, "CHAR_LIMIT", DEFAULT_CHAR_LIMIT);

        let temperature = lookup("COMPLETION_TEMPERATURE")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|t| t.is_finite() && (0.0..=2.0).contains(t))
            .unwrap_or(DEFAULT_TEMPERATURE);

        Self {
            extraction: ExtractionBudget::new(page_limit, char_limit),
            ocr_scale: positive(&lookup, "OCR_SCALE", DEFAULT_OCR_SCALE),
            ocr_language: text("OCR_LANGUAGE").unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            paragraph_chars: positive(&lookup, "PARAGRAPH_CHARS", DEFAULT_PARAGRAPH_CHARS),
            remote: RemoteOptions {
                model: text("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature,
                base_url: text("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                max_chars: positive(&lookup, "MODEL_CHAR_LIMIT", DEFAULT_MODEL_CHAR_LIMIT),
                ..defaults
            },
            pricing: PRICING_4O_MINI,
            state_path: text("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".lesson_quiz/state.json")),
            quiz_dir: text("QUIZ_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".lesson_quiz/quizzes")),
            user: text("QUIZ_USER"),
        }
    }
}

fn positive<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.extraction.page_limit(), 10);
        assert_eq!(config.extraction.char_limit(), 40_000);
        assert_eq!(config.paragraph_chars, 280);
        assert_eq!(config.remote.model, "gpt-4o-mini");
        assert_eq!(config.ocr_language, "eng");
        assert!(config.user.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PAGE_LIMIT", "3"),
            ("CHAR_LIMIT", "500"),
            ("OCR_SCALE", "3.5"),
            ("COMPLETION_MODEL", "gpt-4o"),
            ("QUIZ_USER", "instructor-7"),
            ("QUIZ_DIR", "/tmp/q"),
        ]));
        assert_eq!(config.extraction.page_limit(), 3);
        assert_eq!(config.extraction.char_limit(), 500);
        assert_eq!(config.ocr_scale, 3.5);
        assert_eq!(config.remote.model, "gpt-4o");
        assert_eq!(config.user.as_deref(), Some("instructor-7"));
        assert_eq!(config.quiz_dir, PathBuf::from("/tmp/q"));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PAGE_LIMIT", "0"),
            ("CHAR_LIMIT", "lots"),
            ("OCR_SCALE", "-1"),
            ("COMPLETION_TEMPERATURE", "9"),
        ]));
        assert_eq!(config.extraction.page_limit(), 10);
        assert_eq!(config.extraction.char_limit(), 40_000);
        assert_eq!(config.ocr_scale, 2.0);
        assert_eq!(config.remote.temperature, 0.2);
    }
}
