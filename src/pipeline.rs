// End-to-end batch run: extract, assign rotations, deduplicate, write, relocate
use crate::batch::{relocate, BatchExtractor, CancelFlag, ProcessingLog, COMBINED_TABLE, PROCESSING_LOG};
use crate::config::{Config, Layout};
use crate::dedup::{drop_duplicates, flag_for_review};
use crate::rotation::assign_rotations;
use crate::sink::{deliver_all, ArtifactSink};
use crate::staging::{batch_stamp, stage_registrations, StagingReport};
use crate::table::{Table, CANONICAL_COLUMNS};
use crate::types::{Result, TechlogError};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const EXTENDED_TABLE: &str = "combined_data_extended.csv";
pub const REVIEW_DIR: &str = "duplicates";

/// What a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub batch: String,
    /// Where the batch folder ended up: `Processed/<batch>`, or still under
    /// `Processing/` when the run was cancelled.
    pub folder: PathBuf,
    pub success_files: Vec<String>,
    pub failed_files: Vec<(String, String)>,
    pub records: usize,
    /// Rows left in the combined table after dropping duplicates.
    pub kept: usize,
    pub review_written: bool,
    pub cancelled: bool,
    pub artifacts: Vec<PathBuf>,
    pub sink_failures: Vec<(String, String)>,
}

pub struct Pipeline {
    extractor: BatchExtractor,
    layout: Layout,
    split_not_flown: bool,
    sinks: Vec<Box<dyn ArtifactSink>>,
}

impl Pipeline {
    pub fn new(extractor: BatchExtractor, layout: Layout, split_not_flown: bool) -> Self {
        Self {
            extractor,
            layout,
            split_not_flown,
            sinks: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = BatchExtractor::new(
            Arc::new(config.build_extractor()?),
            config.text_source(),
            config.workers,
        );
        let mut pipeline = Self::new(extractor, config.layout(), config.split_not_flown);
        for sink in config.sinks() {
            pipeline = pipeline.with_sink(sink);
        }
        Ok(pipeline)
    }

    pub fn with_sink(mut self, sink: Box<dyn ArtifactSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Stage the registrations into a fresh batch, then process it.
    pub async fn run(&self, registrations: &[String], cancel: &CancelFlag) -> Result<(StagingReport, PipelineReport)> {
        self.layout.init()?;
        let stamp = batch_stamp(Local::now().naive_local());
        let staging = stage_registrations(&self.layout, registrations, &stamp)?;
        if staging.file_count() == 0 {
            return Err(TechlogError::NothingStaged(registrations.to_vec()));
        }
        let report = self.process(&stamp, cancel).await?;
        Ok((staging, report))
    }

    /// Process `Processing/<batch>`.
    ///
    /// Every artifact is written inside the batch folder before it moves to
    /// `Processed/`. A cancelled run writes its partial tables and stays put.
    pub async fn process(&self, batch: &str, cancel: &CancelFlag) -> Result<PipelineReport> {
        let folder = self.layout.processing().join(batch);
        let mut outcome = self.extractor.process_folder(&folder, cancel).await?;

        let records = assign_rotations(std::mem::take(&mut outcome.records));
        let extended = Table::extended_from_records(&records);
        let extended_path = folder.join(EXTENDED_TABLE);
        extended.write_csv(&extended_path)?;

        let combined = drop_duplicates(&extended.project(CANONICAL_COLUMNS))?;
        combined.write_csv(&folder.join(COMBINED_TABLE))?;

        let review = flag_for_review(&extended, self.split_not_flown)?;
        let review_sheets = match &review {
            Some(report) => report.write(&folder.join(REVIEW_DIR))?,
            None => Vec::new(),
        };

        let log = ProcessingLog::new(&folder);
        log.append_summary(&outcome, Local::now().naive_local())?;

        let mut report = PipelineReport {
            batch: batch.to_string(),
            folder: folder.clone(),
            success_files: outcome.success_files,
            failed_files: outcome.failed_files,
            records: records.len(),
            kept: combined.len(),
            review_written: !review_sheets.is_empty(),
            cancelled: outcome.cancelled,
            ..PipelineReport::default()
        };

        if report.cancelled {
            warn!(batch, "run cancelled; batch folder left in Processing");
            report.artifacts = artifact_paths(&folder, &review_sheets, &folder);
            return Ok(report);
        }

        let destination = relocate(&folder, &self.layout.processed())?;
        report.artifacts = artifact_paths(&destination, &review_sheets, &folder);
        report.folder = destination;
        report.sink_failures = deliver_all(&self.sinks, batch, &report.artifacts);

        info!(
            batch,
            records = report.records,
            kept = report.kept,
            failed = report.failed_files.len(),
            "batch complete"
        );
        Ok(report)
    }
}

// Review sheets were written under `written_in`; re-root them at `folder`.
fn artifact_paths(folder: &Path, review_sheets: &[PathBuf], written_in: &Path) -> Vec<PathBuf> {
    let mut paths = vec![
        folder.join(PROCESSING_LOG),
        folder.join(EXTENDED_TABLE),
        folder.join(COMBINED_TABLE),
    ];
    for sheet in review_sheets {
        if let Ok(relative) = sheet.strip_prefix(written_in) {
            paths.push(folder.join(relative));
        }
    }
    paths
}
