//! Engine configuration
//!
//! Loaded from an optional YAML file, then overridden by CLI flags
//! (which fall back to `ENRICH_*` environment variables).

use crate::error::{EnrichError, EnrichResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Variables in filter expressions look like `e00001v`
pub const DEFAULT_VARIABLE_PATTERN: &str = r"[eE]\d{5}[vV]";

pub const DEFAULT_PLACEHOLDER_DELIMITER: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Regex for variables on the right-hand side of filter comparisons
    pub variable_pattern: String,
    pub placeholder_prefix: String,
    pub placeholder_suffix: String,
    /// Enrich independent entity instances on the rayon pool
    pub parallel: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            variable_pattern: DEFAULT_VARIABLE_PATTERN.to_string(),
            placeholder_prefix: DEFAULT_PLACEHOLDER_DELIMITER.to_string(),
            placeholder_suffix: DEFAULT_PLACEHOLDER_DELIMITER.to_string(),
            parallel: false,
        }
    }
}

impl EnrichConfig {
    /// Read a YAML config file; missing keys keep their defaults
    pub fn load(path: &Path) -> EnrichResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EnrichConfig = serde_yaml::from_str(&content)
            .map_err(|e| EnrichError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EnrichResult<()> {
        if self.placeholder_prefix.is_empty() || self.placeholder_suffix.is_empty() {
            return Err(EnrichError::Config(
                "placeholder delimiters must not be empty".to_string(),
            ));
        }
        Regex::new(&self.variable_pattern).map_err(|e| {
            EnrichError::Config(format!(
                "invalid variable pattern '{}': {}",
                self.variable_pattern, e
            ))
        })?;
        Ok(())
    }
}
