// techlog: tech-log PDF batch extraction, rotation assignment and deduplication
pub mod batch;
pub mod classify;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod lookup;
pub mod pdf_extraction;
pub mod pipeline;
pub mod rotation;
pub mod sink;
pub mod staging;
pub mod table;
pub mod types;

pub use batch::{BatchExtractor, BatchOutcome, CancelFlag};
pub use config::{Config, Layout};
pub use pipeline::{Pipeline, PipelineReport};
pub use types::{FlightRecord, Result, Status, TechlogError};
