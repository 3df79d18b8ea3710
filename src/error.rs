use thiserror::Error;

/// Every terminal failure the lesson-to-quiz pipeline can surface to a user.
///
/// Stage-internal failures (one page that cannot be read, one malformed
/// item in a completion) are recovered where they happen and never reach
/// this type on their own.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Could not extract text from this PDF: {0}")]
    Extraction(String),

    #[error("Only PDF files are supported: {0}")]
    UnsupportedFile(String),

    #[error("Invalid OpenAI API key. Paste a valid 'sk-...' key.")]
    InvalidKey,

    #[error("Enter your OpenAI key (BYOK) to use AI generation.")]
    MissingKey,

    #[error(
        "Over your local soft budget: estimated ${estimated_usd:.4} + spent ${spent_usd:.4} > budget ${budget_usd:.4}. \
         Increase it or lower question count."
    )]
    BudgetExceeded {
        estimated_usd: f64,
        spent_usd: f64,
        budget_usd: f64,
    },

    #[error("OpenAI error ({status}): {body}")]
    RemoteService { status: u16, body: String },

    #[error("Request to the completion service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI did not return valid JSON: {0}")]
    Parse(String),

    #[error("AI returned no valid questions.")]
    NoValidQuestions,

    #[error("Paste text or upload a PDF first.")]
    EmptyInput,

    #[error("Add a quiz title first.")]
    MissingTitle,

    #[error("Generate questions before saving.")]
    NoQuestions,

    #[error("Sign in first.")]
    NotSignedIn,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QuizError>;
