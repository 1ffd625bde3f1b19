// Staging: move uploaded reports from To_Be_Processed/<REG>/ into a batch folder
use crate::batch::MAPPING_FILE;
use crate::config::Layout;
use crate::types::{Result, TechlogError};
use chrono::{Local, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BATCH_STAMP: &str = "%Y%m%d%H%M%S";

/// Batch folder name for a run started at `now`.
pub fn batch_stamp(now: NaiveDateTime) -> String {
    now.format(BATCH_STAMP).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    pub batch_dir: PathBuf,
    /// (registration, files moved)
    pub staged: Vec<(String, Vec<String>)>,
    /// (registration, error message)
    pub failed: Vec<(String, String)>,
}

impl StagingReport {
    pub fn file_count(&self) -> usize {
        self.staged.iter().map(|(_, files)| files.len()).sum()
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Stage every registration folder into `Processing/<stamp>/`. A registration
/// that cannot be staged is reported and the rest carry on. The batch folder
/// only exists afterwards if at least one file was staged.
pub fn stage_registrations(layout: &Layout, registrations: &[String], stamp: &str) -> Result<StagingReport> {
    let batch_dir = layout.processing().join(stamp);
    let mut report = StagingReport {
        batch_dir: batch_dir.clone(),
        ..StagingReport::default()
    };
    for reg in registrations {
        match stage_registration(layout, reg, &batch_dir, Local::now().naive_local()) {
            Ok(files) => report.staged.push((reg.clone(), files)),
            Err(e) => {
                warn!(registration = %reg, error = %e, "failed to stage registration");
                report.failed.push((reg.clone(), e.to_string()));
            }
        }
    }
    if report.file_count() == 0 && batch_dir.is_dir() {
        fs::remove_dir(&batch_dir)?;
    }
    Ok(report)
}

/// Copy the files of one registration folder into `batch_dir`, record each
/// in the mapping file and the dated move log, then remove the source folder.
pub fn stage_registration(layout: &Layout, reg: &str, batch_dir: &Path, now: NaiveDateTime) -> Result<Vec<String>> {
    let source = layout.to_be_processed().join(reg);
    if !source.is_dir() {
        return Err(TechlogError::FolderNotFound(source));
    }
    fs::create_dir_all(batch_dir)?;
    fs::create_dir_all(layout.move_logs())?;

    let batch_name = batch_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let move_log = layout.move_logs().join(format!("{}.log", now.format("%Y%m%d")));
    let mapping = batch_dir.join(MAPPING_FILE);

    let mut entries: Vec<PathBuf> = fs::read_dir(&source)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let mut moved = Vec::with_capacity(entries.len());
    for path in entries {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        fs::copy(&path, batch_dir.join(&name))?;
        append_line(&mapping, &format!("{}:{}", name, reg))?;
        append_line(
            &move_log,
            &format!(
                "{} from folder {} moved to processing folder {} on date {}",
                name,
                reg,
                batch_name,
                now.format("%d/%m/%y %H:%M:%S")
            ),
        )?;
        moved.push(name);
    }

    if let Err(e) = fs::remove_dir_all(&source) {
        warn!(folder = %source.display(), error = %e, "could not delete source folder");
    }
    info!(registration = reg, files = moved.len(), batch = %batch_name, "staged registration");
    Ok(moved)
}
