//! Remove a snapshot from the journal

use crate::locks::RepoLock;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use strata_core::ObjectId;
use strata_journal::SnapshotFilter;

pub async fn run(repo_root: PathBuf, reference: String) -> Result<()> {
    let id = tokio::task::spawn_blocking(move || forget_snapshot(&repo_root, &reference)).await??;
    println!("removed snapshot {}", id.to_string().yellow());
    Ok(())
}

/// Delete the snapshot named by `reference` under an exclusive lock
///
/// Objects it references stay in the repository.
pub fn forget_snapshot(repo_root: &Path, reference: &str) -> Result<ObjectId> {
    let (repo, journal) = util::open_repo(repo_root)?;
    let _lock = RepoLock::exclusive(&repo.locks_dir())?;

    let stored = util::resolve_snapshot_ref(reference, &journal, &SnapshotFilter::default())?;
    if !journal.delete(&stored.id)? {
        anyhow::bail!("Snapshot not found: {}", stored.id);
    }

    tracing::info!("Forgot snapshot {}", stored.id.short());
    Ok(stored.id)
}
