//! Recognition fallback for PDFs without a text layer.
//!
//! Each page inside the budget is rasterized with `pdftoppm` and read back
//! with `tesseract`. Both run as external processes, one page at a time.
//! The page count comes from `pdfinfo`, so a file the text layer could not
//! parse can still be recognized.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::chunker::collapse_whitespace;
use crate::pdf::{collect_pages, ExtractionBudget, ExtractionStrategy};

/// Upscaling applied before recognition. Higher reads small print better
/// but renders and recognizes slower.
pub const DEFAULT_OCR_SCALE: f32 = 2.0;
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// PDF user-space resolution; `scale` multiplies it.
const BASE_DPI: f32 = 72.0;

/// Renders pages of a PDF to PNG bytes.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, pdf: &Path) -> Result<u32>;
    fn rasterize(&self, pdf: &Path, page: u32, scale: f32) -> Result<Vec<u8>>;
}

/// Reads text out of a PNG image.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, png: &[u8]) -> Result<String>;
}

/// Poppler's `pdftoppm`, with `pdfinfo` for the page count.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
    info_binary: String,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            info_binary: "pdfinfo".to_string(),
        }
    }
}

/// Reads the `Pages:` line of `pdfinfo` output.
fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

impl PageRasterizer for PdftoppmRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<u32> {
        let output = Command::new(&self.info_binary)
            .arg(pdf)
            .output()
            .with_context(|| format!("{} failed to start", self.info_binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} failed: {}",
                self.info_binary,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_page_count(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("{} reported no page count", self.info_binary))
    }

    fn rasterize(&self, pdf: &Path, page: u32, scale: f32) -> Result<Vec<u8>> {
        let workdir = tempfile::Builder::new()
            .prefix("lesson_quiz_ocr_")
            .tempdir()
            .context("Failed to create a render directory")?;
        let prefix = workdir.path().join("page");
        let dpi = (BASE_DPI * scale).round().max(1.0) as u32;

        let output = Command::new(&self.binary)
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .with_context(|| format!("{} failed to start", self.binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} failed for page {}: {}",
                self.binary,
                page,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let png = prefix.with_extension("png");
        std::fs::read(&png)
            .with_context(|| format!("{} produced no image for page {}", self.binary, page))
    }
}

/// The `tesseract` command-line engine.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_OCR_LANGUAGE)
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, png: &[u8]) -> Result<String> {
        let mut image = tempfile::Builder::new()
            .prefix("lesson_quiz_page_")
            .suffix(".png")
            .tempfile()
            .context("Failed to create an image file for recognition")?;
        image.write_all(png)?;
        image.flush()?;

        let output = Command::new(&self.binary)
            .arg(image.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .with_context(|| format!("{} failed to start", self.binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} failed: {}",
                self.binary,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).replace('\x0c', ""))
    }
}

/// Rasterize-then-recognize extraction, page by page.
pub struct OcrStrategy {
    rasterizer: Box<dyn PageRasterizer>,
    recognizer: Box<dyn TextRecognizer>,
    scale: f32,
}

impl OcrStrategy {
    pub fn new(
        rasterizer: impl PageRasterizer + 'static,
        recognizer: impl TextRecognizer + 'static,
        scale: f32,
    ) -> Self {
        Self {
            rasterizer: Box::new(rasterizer),
            recognizer: Box::new(recognizer),
            scale,
        }
    }

    /// pdftoppm + tesseract with the given scale and language.
    pub fn external(scale: f32, language: &str) -> Self {
        Self::new(
            PdftoppmRasterizer::default(),
            TesseractRecognizer::new(language),
            scale,
        )
    }

    fn read_page(&self, pdf: &Path, page: u32) -> Result<String> {
        let png = self.rasterizer.rasterize(pdf, page, self.scale)?;
        let raw = self.recognizer.recognize(&png)?;
        let text = collapse_whitespace(&raw);
        info!("[ocr] page {} text length={}", page, text.chars().count());
        Ok(text)
    }
}

impl ExtractionStrategy for OcrStrategy {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract(&self, path: &Path, budget: &ExtractionBudget) -> Result<String> {
        let page_count = self.rasterizer.page_count(path)?;
        debug!("[ocr] rendering at scale {}", self.scale);
        Ok(collect_pages(self.name(), page_count, budget, |page| {
            self.read_page(path, page)
        }))
    }
}
