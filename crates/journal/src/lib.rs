//! Snapshots and incremental tree updates
//!
//! This crate provides:
//! - Snapshot records (content-hash ids, parent links)
//! - Append-only snapshot journal (sled embedded DB)
//! - Snapshot filters for picking the latest matching snapshot
//! - Incremental tree merge from a sorted list of change-paths

mod archive;
pub mod error;
pub mod filter;
pub mod incremental;
pub mod journal;
pub mod snapshot;

// Re-exports
pub use error::IncrementalError;
pub use filter::SnapshotFilter;
pub use incremental::{MergeStats, TreeMerger};
pub use journal::Journal;
pub use snapshot::{Snapshot, SnapshotMetadata, StoredSnapshot};

/// Result type for journal operations
pub type Result<T> = anyhow::Result<T>;
