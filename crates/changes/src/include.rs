//! Include options: literal change-paths given on the command line or in files
//!
//! Each entry must still compile as a gitignore-style pattern so mistakes
//! surface early, naming the flag they came from.

use crate::error::ConfigError;
use ignore::gitignore::GitignoreBuilder;
use std::fs;
use std::path::{Path, PathBuf};

pub const FLAG_INCLUDE: &str = "--include";
pub const FLAG_IINCLUDE: &str = "--iinclude";
pub const FLAG_INCLUDE_FILE: &str = "--include-file";
pub const FLAG_IINCLUDE_FILE: &str = "--iinclude-file";

/// Sources of change-paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeOptions {
    /// `--include`
    pub includes: Vec<String>,
    /// `--iinclude`
    pub insensitive_includes: Vec<String>,
    /// `--include-file`
    pub include_files: Vec<PathBuf>,
    /// `--iinclude-file`
    pub insensitive_include_files: Vec<PathBuf>,
}

impl IncludeOptions {
    /// True when no include option was given at all
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
            && self.insensitive_includes.is_empty()
            && self.include_files.is_empty()
            && self.insensitive_include_files.is_empty()
    }

    /// Gather every entry into one unsorted list
    ///
    /// Pattern files are read and validated first. Case-sensitive entries come
    /// before case-insensitive ones; entries are kept as written (no case
    /// folding).
    pub fn collect_paths(&self) -> Result<Vec<String>, ConfigError> {
        let mut includes = self.includes.clone();
        validate_patterns(&includes, FLAG_INCLUDE)?;

        let mut insensitive = self.insensitive_includes.clone();
        validate_patterns(&insensitive, FLAG_IINCLUDE)?;

        if !self.include_files.is_empty() {
            let from_files = read_patterns_from_files(&self.include_files)?;
            validate_patterns(&from_files, FLAG_INCLUDE_FILE)?;
            includes.extend(from_files);
        }

        if !self.insensitive_include_files.is_empty() {
            let from_files = read_patterns_from_files(&self.insensitive_include_files)?;
            validate_patterns(&from_files, FLAG_IINCLUDE_FILE)?;
            insensitive.extend(from_files);
        }

        includes.extend(insensitive);
        tracing::debug!("Collected {} include entries", includes.len());
        Ok(includes)
    }
}

/// Read entries from pattern files
///
/// One entry per line. Lines are trimmed; blank lines and lines starting with
/// `#` are skipped. `$VAR` and `${VAR}` are expanded from the environment.
pub fn read_patterns_from_files<P: AsRef<Path>>(files: &[P]) -> Result<Vec<String>, ConfigError> {
    let mut patterns = Vec::new();

    for file in files {
        let path = file.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            patterns.push(expand_env(line));
        }
    }

    Ok(patterns)
}

/// Check that each entry compiles as a pattern
pub fn validate_patterns(patterns: &[String], flag: &'static str) -> Result<(), ConfigError> {
    let mut builder = GitignoreBuilder::new("/");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| ConfigError::InvalidPattern {
                flag,
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// Expand `$VAR` and `${VAR}`; unset variables expand to nothing
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let rest = &input[i + 1..];
        if let Some(braced) = rest.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&lookup(&braced[..end]));
                // Skip "{name}"
                for _ in 0..braced[..end].chars().count() + 2 {
                    chars.next();
                }
                continue;
            }
            out.push(c);
            continue;
        }

        let name_len = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(rest.len());
        if name_len == 0 {
            out.push(c);
            continue;
        }

        out.push_str(&lookup(&rest[..name_len]));
        for _ in 0..name_len {
            chars.next();
        }
    }

    out
}

fn lookup(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}
