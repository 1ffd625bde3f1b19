// Batch extraction: one processing folder of tech-log PDFs -> flight records
//
// Files are extracted on tokio's blocking pool with at most `workers` in flight.
// Results are consumed in directory order, so the processing log and the record
// table read the same way no matter which worker finishes first.

use crate::classify::classify;
use crate::pdf_extraction::fields::{FieldExtractor, FileContext};
use crate::pdf_extraction::text_source::TextSource;
use crate::types::{FlightRecord, Result, TechlogError};
use chrono::{Local, NaiveDateTime};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const PROCESSING_LOG: &str = "processing_log.log";
pub const MAPPING_FILE: &str = "file_reg_mapping.txt";
pub const COMBINED_TABLE: &str = "combined_data.csv";

const LOG_TIMESTAMP: &str = "%d/%m/%y %H:%M:%S";

/// Shared stop request. Checked before each new file is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `filename:registration` lines written while staging. The first entry for a
/// filename wins; lines without a colon are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationMapping {
    entries: HashMap<String, String>,
}

impl RegistrationMapping {
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let Some((file, reg)) = line.trim().split_once(':') else {
                continue;
            };
            entries.entry(file.to_string()).or_insert_with(|| reg.to_string());
        }
        Self { entries }
    }

    /// Mapping file of `folder`. A missing file is an empty mapping.
    pub fn load(folder: &Path) -> Result<Self> {
        let path = folder.join(MAPPING_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn registration_for(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only human readable log kept inside the batch folder.
#[derive(Debug, Clone)]
pub struct ProcessingLog {
    path: PathBuf,
}

impl ProcessingLog {
    pub fn new(folder: &Path) -> Self {
        Self {
            path: folder.join(PROCESSING_LOG),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn started(&self, at: NaiveDateTime) -> Result<()> {
        self.append(&format!("Started processing at {}\n", at.format(LOG_TIMESTAMP)))
    }

    pub fn processed(&self, filename: &str, enquiry_no: &str) -> Result<()> {
        self.append(&format!("Processed: {} (EnquiryNo: {})\n", filename, enquiry_no))
    }

    pub fn error(&self, filename: &str, message: &str) -> Result<()> {
        self.append(&format!("Error reading {}: {}\n", filename, message))
    }

    /// Closing block of a run: success and failure lists, count, completion marker.
    pub fn append_summary(&self, outcome: &BatchOutcome, at: NaiveDateTime) -> Result<()> {
        let failed: Vec<&str> = outcome.failed_files.iter().map(|(f, _)| f.as_str()).collect();
        let summary = format!(
            "Successfully processed files: {}\nFailed files: {}\n{} files processed and appended to {} on {}\nProcessing complete\n",
            join_or_none(&outcome.success_files),
            join_or_none(&failed),
            outcome.success_files.len(),
            COMBINED_TABLE,
            at.format(LOG_TIMESTAMP),
        );
        self.append(&summary)
    }
}

fn join_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

/// Everything one pass over a folder produced.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<FlightRecord>,
    pub success_files: Vec<String>,
    /// (filename, error message)
    pub failed_files: Vec<(String, String)>,
    /// Set when a cancel request left files unstarted.
    pub cancelled: bool,
}

/// PDFs directly inside `folder`, sorted by file name. The extension match is
/// case-insensitive.
pub fn list_pdfs(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

fn worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

struct InFlight {
    filename: String,
    enquiry_no: String,
    handle: JoinHandle<Result<FlightRecord>>,
}

pub struct BatchExtractor {
    extractor: Arc<FieldExtractor>,
    source: Arc<dyn TextSource>,
    workers: usize,
}

impl BatchExtractor {
    /// `workers == 0` means one per available CPU.
    pub fn new(extractor: Arc<FieldExtractor>, source: Arc<dyn TextSource>, workers: usize) -> Self {
        let workers = if workers == 0 { worker_count() } else { workers };
        Self {
            extractor,
            source,
            workers,
        }
    }

    /// Extract and classify every PDF in `folder`.
    ///
    /// A missing folder or a folder without PDFs fails before anything is
    /// written. Individual unreadable files are logged and listed in
    /// `failed_files`; the batch carries on.
    pub async fn process_folder(&self, folder: &Path, cancel: &CancelFlag) -> Result<BatchOutcome> {
        if !folder.is_dir() {
            return Err(TechlogError::FolderNotFound(folder.to_path_buf()));
        }
        let pdfs = list_pdfs(folder)?;
        if pdfs.is_empty() {
            return Err(TechlogError::NoPdfFiles(folder.to_path_buf()));
        }

        let mapping = RegistrationMapping::load(folder)?;
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let log = ProcessingLog::new(folder);
        log.started(Local::now().naive_local())?;
        info!(
            folder = %folder.display(),
            files = pdfs.len(),
            workers = self.workers,
            "processing batch"
        );

        let mut outcome = BatchOutcome::default();
        let mut pending = pdfs.into_iter();
        let mut in_flight: VecDeque<InFlight> = VecDeque::with_capacity(self.workers);

        loop {
            while in_flight.len() < self.workers && !pending.as_slice().is_empty() {
                if cancel.is_cancelled() {
                    if !outcome.cancelled {
                        warn!(remaining = pending.len(), "cancel requested; not starting remaining files");
                    }
                    outcome.cancelled = true;
                    break;
                }
                let Some(path) = pending.next() else { break };
                in_flight.push_back(self.start(path, &mapping, &folder_name));
            }

            let Some(job) = in_flight.pop_front() else { break };
            let result = job
                .handle
                .await
                .map_err(|e| TechlogError::Worker(format!("{}: {}", job.filename, e)))?;

            match result {
                Ok(record) => {
                    log.processed(&job.filename, &job.enquiry_no)?;
                    debug!(file = %job.filename, status = %record.status, "processed");
                    outcome.success_files.push(job.filename);
                    outcome.records.push(record);
                }
                Err(e) => {
                    let message = e.to_string();
                    log.error(&job.filename, &message)?;
                    warn!(file = %job.filename, error = %message, "failed to read file");
                    outcome.failed_files.push((job.filename, message));
                }
            }
        }

        info!(
            processed = outcome.success_files.len(),
            failed = outcome.failed_files.len(),
            cancelled = outcome.cancelled,
            "batch extraction finished"
        );
        Ok(outcome)
    }

    fn start(&self, path: PathBuf, mapping: &RegistrationMapping, folder_name: &str) -> InFlight {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let enquiry_no = mapping
            .registration_for(&filename)
            .unwrap_or(folder_name)
            .to_string();
        let context = FileContext::new(enquiry_no.clone(), filename.clone());

        let extractor = Arc::clone(&self.extractor);
        let source = Arc::clone(&self.source);
        let handle = tokio::task::spawn_blocking(move || {
            extractor
                .extract_file(source.as_ref(), &path, &context)
                .map(classify)
        });

        InFlight {
            filename,
            enquiry_no,
            handle,
        }
    }
}

/// Move a finished batch folder under `processed_dir`, keeping its name.
pub fn relocate(folder: &Path, processed_dir: &Path) -> Result<PathBuf> {
    let name = folder
        .file_name()
        .ok_or_else(|| TechlogError::FolderNotFound(folder.to_path_buf()))?;
    let destination = processed_dir.join(name);
    if destination.exists() {
        return Err(TechlogError::DestinationExists(destination));
    }
    fs::create_dir_all(processed_dir)?;
    fs::rename(folder, &destination)?;
    info!(from = %folder.display(), to = %destination.display(), "relocated batch folder");
    Ok(destination)
}
