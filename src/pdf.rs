use anyhow::{Context, Result as AnyResult};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::chunker::{collapse_whitespace, truncate_chars};
use crate::error::{QuizError, Result};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const DEFAULT_CHAR_LIMIT: usize = 40_000;

/// How much of a document extraction may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionBudget {
    page_limit: u32,
    char_limit: usize,
}

impl ExtractionBudget {
    /// Zero limits are raised to one so a budget is always usable.
    pub fn new(page_limit: u32, char_limit: usize) -> Self {
        Self {
            page_limit: page_limit.max(1),
            char_limit: char_limit.max(1),
        }
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    pub fn char_limit(&self) -> usize {
        self.char_limit
    }
}

impl Default for ExtractionBudget {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, DEFAULT_CHAR_LIMIT)
    }
}

/// A paginated document with an embedded text layer.
pub trait PageSource {
    fn page_count(&self) -> u32;
    /// Embedded text of a 1-based page.
    fn page_text(&self, page: u32) -> AnyResult<String>;
}

/// A PDF on disk, parsed by lopdf.
pub struct PdfFile {
    doc: Document,
}

impl PdfFile {
    pub fn open(path: &Path) -> AnyResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        if bytes.is_empty() {
            anyhow::bail!("File is empty: {}", path.display());
        }

        let doc = Document::load_mem(&bytes)
            .with_context(|| format!("Failed to parse PDF: {}", path.display()))?;
        Ok(Self { doc })
    }
}

impl PageSource for PdfFile {
    fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    fn page_text(&self, page: u32) -> AnyResult<String> {
        self.doc
            .extract_text(&[page])
            .with_context(|| format!("Failed to read text of page {}", page))
    }
}

/// One way of turning a PDF file into text.
///
/// Each strategy opens the file itself, so a document one strategy cannot
/// parse is still handed to the next. An empty string means "nothing
/// usable"; an error is logged and the extractor moves on as well.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, path: &Path, budget: &ExtractionBudget) -> AnyResult<String>;
}

/// Reads pages `1..=min(page_count, page_limit)` in order through `read`,
/// stopping once `char_limit` characters are collected.
///
/// A page whose read fails contributes nothing. The result is
/// whitespace-collapsed and never longer than the character budget.
pub fn collect_pages<F>(
    stage: &str,
    page_count: u32,
    budget: &ExtractionBudget,
    mut read: F,
) -> String
where
    F: FnMut(u32) -> AnyResult<String>,
{
    let pages = page_count.min(budget.page_limit());
    info!(
        "[{}] numPages={} (limiting to {})",
        stage, page_count, pages
    );

    let mut text = String::new();
    let mut chars = 0;

    for page in 1..=pages {
        match read(page) {
            Ok(page_text) => {
                chars += page_text.chars().count() + 1;
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!("[{}] page {} skipped: {:#}", stage, page, e);
                continue;
            }
        }

        if chars >= budget.char_limit() {
            text = truncate_chars(&text, budget.char_limit()).to_string();
            info!("[{}] reached char limit ({})", stage, budget.char_limit());
            break;
        }
    }

    let text = collapse_whitespace(&text);
    debug!("[{}] text length={}", stage, text.chars().count());
    text
}

/// Fast path: the document's embedded, selectable text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayerStrategy;

impl TextLayerStrategy {
    const NAME: &'static str = "text-layer";

    /// Reads the text layer of an already opened document.
    pub fn read(source: &dyn PageSource, budget: &ExtractionBudget) -> String {
        collect_pages(Self::NAME, source.page_count(), budget, |page| {
            source.page_text(page)
        })
    }
}

impl ExtractionStrategy for TextLayerStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, path: &Path, budget: &ExtractionBudget) -> AnyResult<String> {
        let pdf = PdfFile::open(path)?;
        Ok(Self::read(&pdf, budget))
    }
}

/// Tries each strategy in order and keeps the first non-empty result.
pub struct PdfExtractor {
    budget: ExtractionBudget,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PdfExtractor {
    /// An extractor with no strategies yet.
    pub fn new(budget: ExtractionBudget) -> Self {
        Self {
            budget,
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Extracts plain text from the PDF at `path`.
    pub fn extract_path(&self, path: &Path) -> Result<String> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(QuizError::UnsupportedFile(path.display().to_string()));
        }
        if !path.exists() {
            return Err(QuizError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let mut last_failure: Option<String> = None;

        for strategy in &self.strategies {
            match strategy.extract(path, &self.budget) {
                Ok(text) if !text.is_empty() => {
                    info!("Extracted {} characters via {}", text.chars().count(), strategy.name());
                    return Ok(text);
                }
                Ok(_) => warn!("{} returned no text, trying next strategy", strategy.name()),
                Err(e) => {
                    warn!("{} failed: {:#}", strategy.name(), e);
                    last_failure = Some(format!("{} failed: {:#}", strategy.name(), e));
                }
            }
        }

        Err(QuizError::Extraction(last_failure.unwrap_or_else(|| {
            "no text layer and OCR produced nothing".to_string()
        })))
    }
}
