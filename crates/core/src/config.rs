//! Repository configuration (`config.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Repository configuration, written by `init` and read on every open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Object store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// On-disk format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// zstd level used for stored objects
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Files at or above this size are hashed through a memory map
    #[serde(default = "default_mmap_threshold")]
    pub mmap_threshold: u64,
}

/// Background upload pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Number of upload worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Sealed objects allowed to wait for a worker before `save` blocks
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_version() -> u32 {
    1
}

fn default_compression_level() -> i32 {
    3
}

fn default_mmap_threshold() -> u64 {
    4 * 1024 * 1024
}

fn default_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    16
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            compression_level: default_compression_level(),
            mmap_threshold: default_mmap_threshold(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl RepoConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: RepoConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if config.store.version != default_version() {
            anyhow::bail!(
                "Unsupported repository version {} (expected {})",
                config.store.version,
                default_version()
            );
        }

        Ok(config)
    }

    /// Write configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
