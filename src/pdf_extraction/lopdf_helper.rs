// lopdf helper - Pure Rust PDF text operations
use crate::types::{Result, TechlogError};
use lopdf::Document;
use std::path::Path;

/// Load a PDF document using lopdf
pub fn load_pdf(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| TechlogError::Pdf(format!("{}: {}", path.display(), e)))
}

/// Execute an operation with a PDF document
pub fn with_pdf<F, R>(path: &Path, f: F) -> Result<R>
where
    F: FnOnce(&Document) -> Result<R>,
{
    let document = load_pdf(path)?;
    f(&document)
}

/// Text of every page in page order, one page after another.
pub fn extract_all_text(path: &Path) -> Result<String> {
    with_pdf(path, |document| {
        let mut text = String::new();
        for page_number in document.get_pages().keys() {
            let page_text = document
                .extract_text(&[*page_number])
                .map_err(|e| TechlogError::Pdf(format!("page {}: {}", page_number, e)))?;
            text.push_str(&page_text);
            if !page_text.ends_with('\n') {
                text.push('\n');
            }
        }
        Ok(text)
    })
}
