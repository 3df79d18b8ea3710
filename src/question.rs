use serde::{Deserialize, Serialize};

/// Number of options every generated question carries.
pub const CHOICE_COUNT: usize = 4;

/// One multiple-choice question, produced either by the local synthesizer
/// or by the remote generator.
///
/// Fields are private so a value can only exist once [`GeneratedQuestion::new`]
/// has checked the shape: a non-blank prompt, exactly four distinct choices
/// and an answer index inside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawQuestion")]
pub struct GeneratedQuestion {
    prompt: String,
    choices: Vec<String>,
    answer_index: usize,
}

/// Wire shape of a stored question, checked by [`GeneratedQuestion::new`]
/// before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    prompt: String,
    choices: Vec<String>,
    answer_index: usize,
}

impl TryFrom<RawQuestion> for GeneratedQuestion {
    type Error = String;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        Self::new(raw.prompt, raw.choices, raw.answer_index)
    }
}

impl GeneratedQuestion {
    /// Builds a question, returning the reason it was rejected if the shape
    /// is wrong.
    pub fn new(
        prompt: impl Into<String>,
        choices: Vec<String>,
        answer_index: usize,
    ) -> Result<Self, String> {
        let prompt = prompt.into();

        if prompt.trim().is_empty() {
            return Err("prompt is empty".to_string());
        }
        if choices.len() != CHOICE_COUNT {
            return Err(format!(
                "expected {} choices, got {}",
                CHOICE_COUNT,
                choices.len()
            ));
        }
        if choices.iter().any(|c| c.trim().is_empty()) {
            return Err("a choice is empty".to_string());
        }
        for (i, choice) in choices.iter().enumerate() {
            if choices[..i].contains(choice) {
                return Err(format!("duplicate choice '{}'", choice));
            }
        }
        if answer_index >= CHOICE_COUNT {
            return Err(format!("answer index {} out of range", answer_index));
        }

        Ok(Self {
            prompt,
            choices,
            answer_index,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn answer_index(&self) -> usize {
        self.answer_index
    }

    /// The display string of the correct option.
    pub fn answer(&self) -> &str {
        &self.choices[self.answer_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_question() {
        let q = GeneratedQuestion::new("Pick one", choices(&["A", "B", "C", "D"]), 2).unwrap();
        assert_eq!(q.answer(), "C");
        assert_eq!(q.choices().len(), CHOICE_COUNT);
    }

    #[test]
    fn test_rejects_blank_prompt() {
        assert!(GeneratedQuestion::new("   ", choices(&["A", "B", "C", "D"]), 0).is_err());
    }

    #[test]
    fn test_rejects_wrong_choice_count() {
        assert!(GeneratedQuestion::new("Q", choices(&["A", "B", "C"]), 0).is_err());
        assert!(GeneratedQuestion::new("Q", choices(&["A", "B", "C", "D", "E"]), 0).is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_index() {
        assert!(GeneratedQuestion::new("Q", choices(&["A", "B", "A", "D"]), 0).is_err());
        assert!(GeneratedQuestion::new("Q", choices(&["A", "B", "C", "D"]), 4).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let q = GeneratedQuestion::new("Q", choices(&["A", "B", "C", "D"]), 1).unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["answerIndex"], 1);
        assert_eq!(json["choices"][3], "D");
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let stored = r#"{"prompt":"Q","choices":["A","B","C","D"],"answerIndex":3}"#;
        let q: GeneratedQuestion = serde_json::from_str(stored).unwrap();
        assert_eq!(q.answer(), "D");

        let out_of_range = r#"{"prompt":"Q","choices":["A","B","C","D"],"answerIndex":9}"#;
        let err = serde_json::from_str::<GeneratedQuestion>(out_of_range).unwrap_err();
        assert!(err.to_string().contains("answer index 9 out of range"));

        let malformed = r#"{"prompt":"","choices":["A"],"answerIndex":9}"#;
        assert!(serde_json::from_str::<GeneratedQuestion>(malformed).is_err());
    }
}
