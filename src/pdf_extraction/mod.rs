// PDF extraction: text sources, report templates and the field extractor
pub mod fields;
pub mod grammar;
pub mod lopdf_helper;
pub mod text_source;

pub use fields::{FieldExtractor, FileContext};
pub use grammar::{Field, Template, BUILTIN_TEMPLATES, DEFAULT_TEMPLATE};
pub use text_source::{LopdfText, PdfToText, PlainText, TextBackend, TextSource};
