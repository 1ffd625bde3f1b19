// Text sources: how a tech-log PDF becomes plain text for the field grammar
//
// The field extractor never parses PDFs itself. It asks a `TextSource` for the
// concatenated page text and runs its rules over that.

use crate::types::{Result, TechlogError};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use super::lopdf_helper;

pub trait TextSource: Send + Sync {
    /// Full document text, pages concatenated in order.
    fn extract_text(&self, pdf_path: &Path) -> Result<String>;
}

/// Which text backend to use, selectable from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextBackend {
    #[default]
    Lopdf,
    PdfToText,
    /// Files already hold extracted UTF-8 text
    Plain,
}

impl TextBackend {
    pub fn source(self) -> Arc<dyn TextSource> {
        match self {
            TextBackend::Lopdf => Arc::new(LopdfText),
            TextBackend::PdfToText => Arc::new(PdfToText),
            TextBackend::Plain => Arc::new(PlainText),
        }
    }
}

/// Pure Rust extraction through lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfText;

impl TextSource for LopdfText {
    fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        debug!(path = %pdf_path.display(), "extracting text with lopdf");
        lopdf_helper::extract_all_text(pdf_path)
    }
}

/// Shells out to the poppler `pdftotext` utility (raw reading order, no layout).
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfToText;

impl TextSource for PdfToText {
    fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        let output = Command::new("pdftotext")
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf_path)
            .arg("-")
            .output()?;

        if !output.status.success() {
            return Err(TechlogError::Pdf(format!(
                "pdftotext failed on {}: {}",
                pdf_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftotext separates pages with form feeds
        let text = utf8_text(output.stdout, pdf_path)?;
        Ok(text.replace('\u{c}', "\n"))
    }
}

/// Reads the file as UTF-8 text. Invalid UTF-8 is a read failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TextSource for PlainText {
    fn extract_text(&self, pdf_path: &Path) -> Result<String> {
        let bytes = std::fs::read(pdf_path)?;
        utf8_text(bytes, pdf_path)
    }
}

fn utf8_text(bytes: Vec<u8>, pdf_path: &Path) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| TechlogError::Pdf(format!("{} is not UTF-8 text: {}", pdf_path.display(), e)))
}
