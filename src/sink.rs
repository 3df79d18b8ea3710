use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{QuizError, Result};
use crate::question::GeneratedQuestion;

/// Description stamped on every quiz created from a lesson.
pub const GENERATED_DESCRIPTION: &str = "Generated from lesson content";

/// The signed-in user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
}

/// Parent record of a saved quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub owner_uid: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for generated quizzes.
///
/// One call creates the parent record and returns its store-assigned id;
/// questions are then attached one call at a time. Calls are not
/// transactional; a failure can leave a quiz partially filled.
pub trait QuizSink {
    fn create_quiz(&self, record: &QuizRecord) -> impl Future<Output = Result<String>> + Send;

    fn add_question(
        &self,
        quiz_id: &str,
        question: &GeneratedQuestion,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// On-disk document: the quiz record plus its questions in attach order.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredQuiz {
    pub id: String,
    #[serde(flatten)]
    pub record: QuizRecord,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

/// Stores each quiz as `<dir>/<uuid>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn quiz_path(&self, quiz_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", quiz_id))
    }
}

async fn read_quiz(path: &Path) -> anyhow::Result<StoredQuiz> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read quiz file: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Corrupt quiz file: {}", path.display()))
}

async fn write_quiz(path: &Path, quiz: &StoredQuiz) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(quiz)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write quiz file: {}", path.display()))
}

impl QuizSink for JsonDirSink {
    async fn create_quiz(&self, record: &QuizRecord) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| QuizError::Storage(format!("Failed to create {}: {}", self.dir.display(), e)))?;

        let id = Uuid::new_v4().to_string();
        let quiz = StoredQuiz {
            id: id.clone(),
            record: record.clone(),
            questions: Vec::new(),
        };
        write_quiz(&self.quiz_path(&id), &quiz)
            .await
            .map_err(|e| QuizError::Storage(format!("{:#}", e)))?;
        Ok(id)
    }

    async fn add_question(&self, quiz_id: &str, question: &GeneratedQuestion) -> Result<()> {
        let path = self.quiz_path(quiz_id);
        let mut quiz = read_quiz(&path)
            .await
            .map_err(|e| QuizError::Storage(format!("{:#}", e)))?;
        quiz.questions.push(question.clone());
        write_quiz(&path, &quiz)
            .await
            .map_err(|e| QuizError::Storage(format!("{:#}", e)))
    }
}
