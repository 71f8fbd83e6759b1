use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::classify::PatternRule;

/// Error loading a pattern rule file. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pattern file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pattern file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("pattern file '{path}' contains no [[pattern]] entries")]
    Empty { path: String },
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default, rename = "pattern")]
    patterns: Vec<PatternRule>,
}

/// Load an ordered rule list from a TOML file.
///
/// File order is preserved; it determines match priority. Regex validity is
/// checked later by `PatternSet::compile`.
///
/// ```toml
/// [[pattern]]
/// pattern = "(?i)deadlock detected"
/// classification = "critical"
/// description = "Database deadlock"
/// suggestion = "Inspect long-running transactions"
/// ```
pub fn load_pattern_rules(path: &Path) -> Result<Vec<PatternRule>, ConfigError> {
    let display = path.display().to_string();

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;

    let file: PatternFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display.clone(),
        source,
    })?;

    if file.patterns.is_empty() {
        return Err(ConfigError::Empty { path: display });
    }

    Ok(file.patterns)
}
