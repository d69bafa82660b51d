//! Normalized, sorted change-paths ready for a tree merge

use crate::error::ConfigError;
use std::path::{Component, Path};

/// Sorted, deduplicated absolute change-paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    /// Normalize a raw list of change-paths
    ///
    /// Relative entries and entries with a ".." segment are rejected. Repeated
    /// slashes, "." segments and trailing slashes are removed (the root stays
    /// "/"), empty entries dropped, the rest sorted byte-wise and deduplicated.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();

        for raw in paths {
            let raw = raw.as_ref();
            if raw.is_empty() {
                continue;
            }
            if !raw.starts_with('/') {
                return Err(ConfigError::RelativePath(raw.to_string()));
            }
            normalized.push(clean(raw)?);
        }

        normalized.sort_unstable();
        normalized.dedup();

        Ok(Self { paths: normalized })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    /// Borrowed view in the form the merge engine takes
    pub fn as_strs(&self) -> Vec<&str> {
        self.paths.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Rebuild an absolute path from its normal segments
fn clean(raw: &str) -> Result<String, ConfigError> {
    let mut cleaned = String::with_capacity(raw.len());

    for component in Path::new(raw).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(segment) => {
                cleaned.push('/');
                cleaned.push_str(&segment.to_string_lossy());
            }
            Component::ParentDir | Component::Prefix(_) => {
                return Err(ConfigError::ParentSegment(raw.to_string()));
            }
        }
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts_and_dedups() {
        let set = ChangeSet::from_paths(["/docs/b", "/docs/a", "/docs/b", "/bin"]).unwrap();
        assert_eq!(set.as_slice(), ["/bin", "/docs/a", "/docs/b"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_trailing_slash_and_empty() {
        let set = ChangeSet::from_paths(["/docs/", "", "/docs", "/"]).unwrap();
        assert_eq!(set.as_slice(), ["/", "/docs"]);
    }

    #[test]
    fn test_bytewise_order() {
        let set = ChangeSet::from_paths(["/docs2", "/docs/x", "/Docs"]).unwrap();
        assert_eq!(set.as_strs(), vec!["/Docs", "/docs/x", "/docs2"]);
    }

    #[test]
    fn test_relative_rejected() {
        let err = ChangeSet::from_paths(["/ok", "docs/notes.txt"]).unwrap_err();
        assert!(matches!(err, ConfigError::RelativePath(p) if p == "docs/notes.txt"));
    }

    #[test]
    fn test_redundant_segments_removed() {
        let set = ChangeSet::from_paths(["/docs//a.txt", "/docs/./b.txt", "//", "/./"]).unwrap();
        assert_eq!(set.as_slice(), ["/", "/docs/a.txt", "/docs/b.txt"]);
    }

    #[test]
    fn test_parent_segment_rejected() {
        let err = ChangeSet::from_paths(["/data/docs/../other"]).unwrap_err();
        assert!(matches!(err, ConfigError::ParentSegment(p) if p == "/data/docs/../other"));

        assert!(ChangeSet::from_paths(["/.."]).is_err());
    }

    #[test]
    fn test_empty_input() {
        let set = ChangeSet::from_paths(Vec::<String>::new()).unwrap();
        assert!(set.is_empty());
    }
}
