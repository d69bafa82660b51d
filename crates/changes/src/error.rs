//! Errors raised while preparing change-paths

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An entry does not compile as a pattern; `flag` is the option it came from
    #[error("{flag}: invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        flag: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("failed to read pattern file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("change path must be absolute: {0:?}")]
    RelativePath(String),

    #[error("change path must not contain \"..\": {0:?}")]
    ParentSegment(String),
}
