// Artifact sinks: where finished batch artifacts are handed off after relocation
use crate::types::{Result, TechlogError};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Receives the files a finished batch produced. Delivery failures never undo
/// the batch; the caller only logs them.
pub trait ArtifactSink: Send + Sync {
    fn name(&self) -> &str;
    fn deliver(&self, batch: &str, artifacts: &[PathBuf]) -> Result<()>;
}

/// Copies artifacts into `<root>/<batch>/`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ArtifactSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    fn deliver(&self, batch: &str, artifacts: &[PathBuf]) -> Result<()> {
        let target = self.root.join(batch);
        fs::create_dir_all(&target)?;
        for artifact in artifacts {
            let name = artifact
                .file_name()
                .ok_or_else(|| TechlogError::Config(format!("artifact {} has no file name", artifact.display())))?;
            fs::copy(artifact, target.join(name))?;
        }
        info!(sink = self.name(), batch, files = artifacts.len(), "delivered artifacts");
        Ok(())
    }
}

/// Offer the artifacts to every sink. Returns (sink name, error) for each failure.
pub fn deliver_all(sinks: &[Box<dyn ArtifactSink>], batch: &str, artifacts: &[PathBuf]) -> Vec<(String, String)> {
    let mut failures = Vec::new();
    for sink in sinks {
        if let Err(e) = sink.deliver(batch, artifacts) {
            warn!(sink = sink.name(), batch, error = %e, "artifact delivery failed");
            failures.push((sink.name().to_string(), e.to_string()));
        }
    }
    failures
}
