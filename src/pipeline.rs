use chrono::Utc;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::billing::{self, BudgetState, CostEstimate, ModelPricing};
use crate::config::Config;
use crate::error::{QuizError, Result};
use crate::llm::{self, CompletionBackend, RemoteOptions};
use crate::local;
use crate::ocr::OcrStrategy;
use crate::pdf::{PdfExtractor, TextLayerStrategy};
use crate::question::GeneratedQuestion;
use crate::sink::{Identity, QuizRecord, QuizSink, GENERATED_DESCRIPTION};
use crate::storage::{self, KeyValueStore};

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 20;

/// Which generator produces the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Local,
    Remote,
}

/// Keeps requested counts inside what the generators are asked for.
pub fn clamp_count(count: usize) -> usize {
    count.clamp(MIN_QUESTIONS, MAX_QUESTIONS)
}

/// Lesson → questions → sink.
///
/// Owns the budget and the stored credential. Every mutating operation takes
/// `&mut self`, so only one generation can be in flight per pipeline and
/// budget updates are never interleaved.
pub struct Pipeline<S, B, K> {
    store: S,
    backend: B,
    sink: K,
    extractor: Arc<PdfExtractor>,
    rng: StdRng,
    budget: BudgetState,
    api_key: Option<String>,
    remote: RemoteOptions,
    pricing: ModelPricing,
    paragraph_chars: usize,
}

impl<S, B, K> Pipeline<S, B, K>
where
    S: KeyValueStore,
    B: CompletionBackend,
    K: QuizSink,
{
    /// Builds a pipeline, reading budget and credential from `store`.
    pub fn new(
        store: S,
        backend: B,
        sink: K,
        extractor: PdfExtractor,
        rng: StdRng,
        config: &Config,
    ) -> Self {
        let budget = storage::load_budget(&store);
        let api_key = storage::load_api_key(&store);
        Self {
            store,
            backend,
            sink,
            extractor: Arc::new(extractor),
            rng,
            budget,
            api_key,
            remote: config.remote.clone(),
            pricing: config.pricing,
            paragraph_chars: config.paragraph_chars,
        }
    }

    pub fn budget(&self) -> &BudgetState {
        &self.budget
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn set_budget(&mut self, budget_usd: f64) -> Result<()> {
        self.budget.set_budget(budget_usd);
        storage::save_budget(&mut self.store, &self.budget)
    }

    pub fn reset_spent(&mut self) -> Result<()> {
        self.budget.reset_spent();
        storage::save_budget(&mut self.store, &self.budget)
    }

    /// Stores (or with `None`, forgets) the user's completion-service key.
    pub fn set_api_key(&mut self, key: Option<&str>) -> Result<()> {
        storage::save_api_key(&mut self.store, key)?;
        self.api_key = storage::load_api_key(&self.store);
        Ok(())
    }

    /// Extracts lesson text from a PDF without blocking the runtime.
    pub async fn extract_file(&self, path: &Path) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let path: PathBuf = path.to_path_buf();
        info!("Extracting text from: {}", path.display());

        tokio::task::spawn_blocking(move || extractor.extract_path(&path))
            .await
            .map_err(|e| QuizError::Extraction(format!("extraction task failed: {}", e)))?
    }

    /// Cost of a remote generation of `count` questions from `text`, on the
    /// text that would actually be sent.
    pub fn estimate(&self, text: &str, count: usize) -> CostEstimate {
        let sent = llm::truncate_for_model(text, self.remote.max_chars);
        billing::estimate(sent, clamp_count(count), &self.pricing)
    }

    /// Whether a remote run of this size would pass the budget gate.
    pub fn over_budget(&self, text: &str, count: usize) -> bool {
        self.budget.would_exceed(&self.estimate(text, count))
    }

    /// Generates questions with the chosen strategy.
    ///
    /// The remote path is refused before any request when the key is
    /// missing or malformed, or when the estimate does not fit the budget.
    /// Spend is recorded only after the remote call succeeds.
    pub async fn generate(
        &mut self,
        text: &str,
        count: usize,
        strategy: Strategy,
    ) -> Result<Vec<GeneratedQuestion>> {
        if text.trim().is_empty() {
            return Err(QuizError::EmptyInput);
        }
        let count = clamp_count(count);

        match strategy {
            Strategy::Local => Ok(local::generate_local(
                text,
                count,
                self.paragraph_chars,
                &mut self.rng,
            )),
            Strategy::Remote => self.generate_remote(text, count).await,
        }
    }

    async fn generate_remote(&mut self, text: &str, count: usize) -> Result<Vec<GeneratedQuestion>> {
        let api_key = self.api_key.clone().ok_or(QuizError::MissingKey)?;
        if !llm::is_plausible_key(&api_key) {
            return Err(QuizError::InvalidKey);
        }

        let estimate = self.estimate(text, count);
        self.budget.check(&estimate)?;

        let questions =
            llm::generate_remote(&self.backend, text, count, &api_key, &self.remote).await?;

        self.budget.record_spend(estimate.usd);
        if let Err(e) = storage::save_budget(&mut self.store, &self.budget) {
            // The in-memory total is already updated; the next save retries.
            warn!("Failed to persist spend: {}", e);
        }
        Ok(questions)
    }

    /// Hands a generated quiz to the sink: one parent record, then each
    /// question in order. Returns the store-assigned quiz id.
    pub async fn save(
        &self,
        identity: Option<&Identity>,
        title: &str,
        questions: &[GeneratedQuestion],
    ) -> Result<String> {
        let identity = identity.ok_or(QuizError::NotSignedIn)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(QuizError::MissingTitle);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        let record = QuizRecord {
            owner_uid: identity.uid.clone(),
            title: title.to_string(),
            description: GENERATED_DESCRIPTION.to_string(),
            created_at: Utc::now(),
        };
        let quiz_id = self.sink.create_quiz(&record).await?;
        for question in questions {
            self.sink.add_question(&quiz_id, question).await?;
        }

        info!("Saved quiz {} with {} questions", quiz_id, questions.len());
        Ok(quiz_id)
    }
}

/// The production extraction chain: text layer first, then OCR.
pub fn standard_extractor(config: &Config) -> PdfExtractor {
    PdfExtractor::new(config.extraction)
        .with_strategy(TextLayerStrategy)
        .with_strategy(OcrStrategy::external(config.ocr_scale, &config.ocr_language))
}
