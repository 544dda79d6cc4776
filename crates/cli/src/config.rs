//! Configuration file support for the packer

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Packer configuration. Every field has a default, so a config file
/// only needs to name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Base URL of the dictionary API; the word is appended as a path
    /// segment.
    pub endpoint: String,
    /// File holding the API key (first line, whitespace-trimmed).
    pub api_key_file: PathBuf,
    /// Number of concurrent fetch workers.
    pub workers: usize,
    /// Capacity of the word feed channel.
    pub word_buffer: usize,
    /// Capacity of the fetched-definition channel in front of the single
    /// writer.
    pub def_buffer: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.dictionaryapi.com/api/v3/references/collegiate/json"
                .to_string(),
            api_key_file: PathBuf::from("api_key.txt"),
            workers: 16,
            word_buffer: 64,
            def_buffer: 8,
        }
    }
}

impl PackConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}
