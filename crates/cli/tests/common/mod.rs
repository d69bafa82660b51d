//! Common utilities for integration tests

#![allow(dead_code)]

pub mod cli;

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::Repository;
use tempfile::TempDir;

/// A scratch repository plus a data directory to back up
pub struct Workspace {
    _temp: TempDir,
    pub repo_root: PathBuf,
    /// Canonical absolute path of the data directory
    pub data: PathBuf,
}

impl Workspace {
    /// Create the directories and initialize the repository
    pub fn new() -> Result<Self> {
        let ws = Self::uninitialized()?;
        Repository::init(&ws.repo_root)?;
        Ok(ws)
    }

    /// Create the directories only
    pub fn uninitialized() -> Result<Self> {
        let temp = TempDir::new()?;
        let repo_root = temp.path().join("repo");
        let data = temp.path().join("data");
        fs::create_dir(&data)?;
        let data = data.canonicalize()?;

        Ok(Self {
            _temp: temp,
            repo_root,
            data,
        })
    }

    /// Absolute path string below the data directory
    pub fn abs(&self, rel: &str) -> String {
        format!("{}/{}", self.data.display(), rel)
    }

    pub fn write(&self, rel: &str, content: &[u8]) -> Result<String> {
        let path = self.data.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(self.abs(rel))
    }

    pub fn remove(&self, rel: &str) -> Result<String> {
        let path = self.data.join(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(self.abs(rel))
    }

    pub fn path(&self) -> &Path {
        &self.data
    }
}
