// Core types for techlog: flight records, status, errors
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Disposition of a flight leg. Always derived, never parsed from the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    Completed,
    Cancelled,
    #[serde(rename = "Not Flown")]
    NotFlown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "Completed",
            Status::Cancelled => "Cancelled",
            Status::NotFlown => "Not Flown",
        }
    }

    /// Lenient parse used when reading tables back from disk.
    pub fn parse_loose(value: &str) -> Option<Self> {
        let v = value.trim();
        [Status::Completed, Status::Cancelled, Status::NotFlown]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(v))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the flight table: everything extracted from a single tech-log PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlightRecord {
    pub enquiry_no: String,
    pub date: Option<String>,
    pub flight_number: Option<String>,
    pub registration: Option<String>,
    pub dep: Option<String>,
    pub arr: Option<String>,
    #[serde(rename = "STD")]
    pub std: Option<String>,
    #[serde(rename = "STA")]
    pub sta: Option<String>,
    #[serde(rename = "ETA")]
    pub eta: Option<String>,
    #[serde(rename = "ETD")]
    pub etd: Option<String>,
    #[serde(rename = "ATD")]
    pub atd: Option<String>,
    #[serde(rename = "ATA")]
    pub ata: Option<String>,
    #[serde(rename = "TO")]
    pub takeoff: Option<String>,
    #[serde(rename = "LDG")]
    pub landing: Option<String>,
    pub fuel_burn: Option<i64>,
    pub delay_code: Option<String>,
    pub delay_duration: Option<String>,
    pub delay_reason: Option<String>,
    pub pax: Option<String>,
    pub payload: Option<String>,
    pub reason_of_cancellation: Option<String>,
    pub status: Status,
    pub rotation: u32,
    #[serde(rename = "filename")]
    pub filename: String,
}

impl FlightRecord {
    /// True when the departure and arrival airports are the same (cancelled route).
    pub fn is_same_station(&self) -> bool {
        self.dep == self.arr
    }
}

/// Treat `None`, empty and whitespace-only values alike.
pub fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum TechlogError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read lookup table {path}: {source}")]
    Lookup {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("delay reason table has no fallback entry \"{0}\"")]
    MissingFallbackReason(String),

    #[error("unknown report template: {0}")]
    UnknownTemplate(String),

    #[error("invalid pattern for field {field}: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("No such processing folder: {0}")]
    FolderNotFound(PathBuf),

    #[error("no files staged from registrations {0:?}")]
    NothingStaged(Vec<String>),

    #[error("No PDF files found in folder {0}")]
    NoPdfFiles(PathBuf),

    #[error("Missing key columns: {missing:?}; available columns: {available:?}")]
    MissingKeyColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("extraction worker failed: {0}")]
    Worker(String),

    #[error("folder {0} already exists")]
    DestinationExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, TechlogError>;
