//! Runtime configuration, read from an optional TOML file.
//!
//! ```toml
//! [storage]
//! db_path = "registrar-db"
//!
//! [retry]
//! max_conflict_retries = 3
//!
//! [logging]
//! verbose = false
//! format = "compact"
//! ```

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistrarConfig {
    pub storage: StorageConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Persistent database location. In-memory storage when absent.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// How many times a service re-reads and retries after a write conflict.
    pub max_conflict_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub format: LogFormat,
}

impl RegistrarConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = RegistrarConfig::from_toml_str("").unwrap();
        assert_eq!(config, RegistrarConfig::default());
        assert_eq!(config.retry.max_conflict_retries, 3);
        assert!(config.storage.db_path.is_none());
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_partial_file() {
        let config = RegistrarConfig::from_toml_str(
            "[retry]\nmax_conflict_retries = 0\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();
        assert_eq!(config.retry.max_conflict_retries, 0);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(RegistrarConfig::from_toml_str("[retry]\nmax_conflict_retries = \"x\"").is_err());
    }
}
