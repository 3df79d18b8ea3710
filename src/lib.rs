//! Lesson-to-quiz generation.
//!
//! Extract text from a lesson PDF (embedded text first, OCR as a fallback),
//! then turn it into four-choice questions either locally with a keyword
//! heuristic or remotely through a bring-your-own-key completion service
//! guarded by a local soft budget.

pub mod billing;
pub mod chunker;
pub mod config;
pub mod error;
pub mod keywords;
pub mod llm;
pub mod local;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod question;
pub mod sink;
pub mod storage;
pub mod tokenizer;

pub use billing::{BudgetState, CostEstimate};
pub use config::Config;
pub use error::{QuizError, Result};
pub use pdf::{ExtractionBudget, PdfExtractor};
pub use pipeline::{Pipeline, Strategy};
pub use question::GeneratedQuestion;
