// Configuration for techlog: techlog.toml plus environment overrides
use crate::lookup::{CarrierCodeMap, DelayReasonMap};
use crate::pdf_extraction::fields::FieldExtractor;
use crate::pdf_extraction::grammar::{Template, DEFAULT_TEMPLATE};
use crate::pdf_extraction::text_source::{TextBackend, TextSource};
use crate::sink::{ArtifactSink, DirectorySink};
use crate::types::{Result, TechlogError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const CONFIG_FILE: &str = "techlog.toml";
pub const CONFIG_ENV: &str = "TECHLOG_CONFIG";
pub const DATABASE_DIR_ENV: &str = "TECHLOG_DATABASE_DIR";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub text_backend: TextBackend,
    /// Extraction workers; 0 picks one per CPU.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub lookups: LookupConfig,
    #[serde(default = "default_true")]
    pub split_not_flown: bool,
    /// Finished artifacts are also copied here when set.
    #[serde(default)]
    pub outbox_dir: Option<PathBuf>,
    // Relative lookup paths resolve against this
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_exact_codes")]
    pub exact_codes: PathBuf,
    #[serde(default = "default_prefix_codes")]
    pub prefix_codes: PathBuf,
    #[serde(default = "default_delay_reasons")]
    pub delay_reasons: PathBuf,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            exact_codes: default_exact_codes(),
            prefix_codes: default_prefix_codes(),
            delay_reasons: default_delay_reasons(),
        }
    }
}

fn default_database_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("techlog"))
        .unwrap_or_else(|| PathBuf::from("database"))
}
fn default_template() -> String { DEFAULT_TEMPLATE.to_string() }
fn default_true() -> bool { true }
fn default_exact_codes() -> PathBuf { PathBuf::from("flightCode1.json") }
fn default_prefix_codes() -> PathBuf { PathBuf::from("flightCode2.json") }
fn default_delay_reasons() -> PathBuf { PathBuf::from("DelayReason.json") }

impl Default for Config {
    fn default() -> Self {
        Self {
            database_dir: default_database_dir(),
            template: default_template(),
            text_backend: TextBackend::default(),
            workers: 0,
            lookups: LookupConfig::default(),
            split_not_flown: default_true(),
            outbox_dir: None,
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load from `path`, else `$TECHLOG_CONFIG`, else `./techlog.toml`.
    ///
    /// A path that was asked for explicitly must exist. A missing default file
    /// just means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(TechlogError::Config(format!("config file {} not found", path.display())));
                }
                Self::from_file(&path)?
            }
            None => {
                let path = PathBuf::from(CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config = Self::from_toml_str(&content, base_dir)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| TechlogError::Config(e.to_string()))?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Environment values win over the file.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var(DATABASE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_dir = PathBuf::from(dir);
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.database_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn load_lookups(&self) -> Result<(CarrierCodeMap, DelayReasonMap)> {
        let carrier_codes = CarrierCodeMap::load(
            &self.resolve(&self.lookups.exact_codes),
            &self.resolve(&self.lookups.prefix_codes),
        )?;
        let delay_reasons = DelayReasonMap::load(&self.resolve(&self.lookups.delay_reasons))?;
        Ok((carrier_codes, delay_reasons))
    }

    pub fn build_extractor(&self) -> Result<FieldExtractor> {
        let template = Template::builtin(&self.template)?;
        let (carrier_codes, delay_reasons) = self.load_lookups()?;
        Ok(FieldExtractor::new(template, carrier_codes, delay_reasons))
    }

    pub fn text_source(&self) -> Arc<dyn TextSource> {
        self.text_backend.source()
    }

    pub fn sinks(&self) -> Vec<Box<dyn ArtifactSink>> {
        self.outbox_dir
            .iter()
            .map(|dir| Box::new(DirectorySink::new(dir.clone())) as Box<dyn ArtifactSink>)
            .collect()
    }
}

/// Folder layout under the database directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn to_be_processed(&self) -> PathBuf {
        self.root.join("To_Be_Processed")
    }

    pub fn processing(&self) -> PathBuf {
        self.root.join("Processing")
    }

    pub fn processed(&self) -> PathBuf {
        self.root.join("Processed")
    }

    pub fn move_logs(&self) -> PathBuf {
        self.to_be_processed().join("move_logs")
    }

    pub fn init(&self) -> Result<()> {
        for dir in [self.processing(), self.processed(), self.move_logs()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
