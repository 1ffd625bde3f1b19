// Lookup tables loaded once at startup: carrier codes and delay reasons
use crate::types::{Result, TechlogError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reserved delay code meaning "unknown/unclassified".
pub const FALLBACK_DELAY_CODE: &str = "99";

/// Carrier code normalization: exact table first, then longest prefix.
#[derive(Debug, Clone, Default)]
pub struct CarrierCodeMap {
    exact: HashMap<String, String>,
    // Sorted longest key first
    prefix: Vec<(String, String)>,
}

impl CarrierCodeMap {
    pub fn new(exact: HashMap<String, String>, prefix: HashMap<String, String>) -> Self {
        let exact = exact
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .collect();

        let mut prefix: Vec<(String, String)> = prefix
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        prefix.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self { exact, prefix }
    }

    /// Load both tables from JSON objects of plain strings.
    pub fn load(exact_path: &Path, prefix_path: &Path) -> Result<Self> {
        let exact = read_string_map(exact_path)?;
        let prefix = read_string_map(prefix_path)?;
        debug!(
            exact = exact.len(),
            prefix = prefix.len(),
            "loaded carrier code tables"
        );
        Ok(Self::new(exact, prefix))
    }

    /// Normalize a raw flight number. Unmatched codes pass through unchanged.
    pub fn normalize(&self, code: &str) -> String {
        if code.is_empty() {
            return String::new();
        }

        let upper = code.to_uppercase();
        if let Some(replacement) = self.exact.get(&upper) {
            return replacement.clone();
        }

        for (key, replacement) in &self.prefix {
            if upper.starts_with(key.as_str()) {
                let rest = code.get(key.len()..).unwrap_or_default();
                return format!("{replacement}{rest}");
            }
        }

        code.to_string()
    }
}

/// Delay code -> description, with a mandatory fallback entry.
#[derive(Debug, Clone)]
pub struct DelayReasonMap {
    reasons: HashMap<String, String>,
}

impl DelayReasonMap {
    pub fn new(reasons: HashMap<String, String>) -> Result<Self> {
        if !reasons.contains_key(FALLBACK_DELAY_CODE) {
            return Err(TechlogError::MissingFallbackReason(
                FALLBACK_DELAY_CODE.to_string(),
            ));
        }
        Ok(Self { reasons })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::new(read_string_map(path)?)
    }

    /// Describe a raw delay code such as `07/A`; only the part before `/` is looked up.
    pub fn describe(&self, delay_code: &str) -> &str {
        let code = delay_code.trim();
        let key = code.split('/').next().unwrap_or(code).trim();
        self.reasons
            .get(key)
            .or_else(|| self.reasons.get(FALLBACK_DELAY_CODE))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn read_string_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| TechlogError::Lookup {
        path: path.to_path_buf(),
        source,
    })
}
