//! Create a snapshot from the latest one plus a list of changed paths
//!
//! Only directories on the way to a changed path are read again; everything
//! else is carried over from the prior snapshot's tree by id.

use crate::locks::RepoLock;
use crate::util;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use strata_changes::{ChangeSet, IncludeOptions};
use strata_core::{ObjectId, Repository};
use strata_journal::{
    IncrementalError, Journal, Snapshot, SnapshotFilter, SnapshotMetadata, TreeMerger,
};

/// Everything an incremental run needs besides the repository location
#[derive(Debug, Clone, Default)]
pub struct IncrementalOptions {
    /// Where the change-paths come from
    pub include: IncludeOptions,
    /// Which snapshot to start from
    pub filter: SnapshotFilter,
    /// Overrides for the new snapshot
    pub metadata: SnapshotMetadata,
}

pub async fn run(repo_root: PathBuf, opts: IncrementalOptions) -> Result<()> {
    let id = tokio::task::spawn_blocking(move || {
        incremental_snapshot(&repo_root, &opts, Utc::now())
    })
    .await??;

    println!("snapshot {} saved", id.to_string().yellow());
    Ok(())
}

/// Derive a new snapshot from the latest one matching `opts.filter`
///
/// Returns the id of the new snapshot. Nothing is written to the journal
/// unless every object of the new tree is durable.
pub fn incremental_snapshot(
    repo_root: &Path,
    opts: &IncrementalOptions,
    now: DateTime<Utc>,
) -> Result<ObjectId> {
    let paths = opts.include.collect_paths()?;
    let changes = ChangeSet::from_paths(paths)?;

    // Include files holding only comments count as no changes
    if changes.is_empty() && opts.metadata.is_empty() {
        return Err(IncrementalError::NothingToDo.into());
    }

    let repo = Repository::open(repo_root)
        .with_context(|| format!("Failed to open repository at {}", repo_root.display()))?;
    let _lock = RepoLock::shared(&repo.locks_dir())?;

    let objects = repo.load_index()?;
    tracing::debug!("Loaded index with {} objects", objects);

    let journal = Journal::open(&repo.snapshots_dir())?;
    let prior = journal
        .find_latest(&opts.filter)?
        .ok_or(IncrementalError::NoSnapshotFound)?;
    tracing::info!(
        "Updating snapshot {} with {} changed paths",
        prior.id.short(),
        changes.len()
    );

    repo.start_uploader();
    let mut merger = TreeMerger::new(&repo);
    let tree = merger.merge(Some(prior.snapshot.tree), "/", &changes.as_strs())?;
    repo.flush()?;

    let stats = merger.stats();
    tracing::info!(
        "Merged tree {}: {} trees saved, {} reused, {} files saved, {} removed",
        tree.short(),
        stats.trees_saved,
        stats.trees_reused,
        stats.files_saved,
        stats.removed
    );

    let snapshot = Snapshot::derive(&prior, tree, &opts.metadata, util::username(), now);
    let id = journal.append(&snapshot)?;
    repo.stop_uploader()?;

    Ok(id)
}
