//! Change-path preparation for Strata
//!
//! Turns include options (literal paths on the command line and in pattern
//! files) into the sorted, absolute path list the tree merge consumes.

pub mod changeset;
pub mod error;
pub mod include;

pub use changeset::ChangeSet;
pub use error::ConfigError;
pub use include::{read_patterns_from_files, validate_patterns, IncludeOptions};
