//! Create a first snapshot of a set of paths

use crate::locks::RepoLock;
use crate::util;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use strata_changes::ChangeSet;
use strata_core::{ObjectId, Repository};
use strata_journal::{Journal, Snapshot, TreeMerger};

/// What to back up and how to label it
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub paths: Vec<PathBuf>,
    pub tags: Vec<String>,
    /// Hostname to record instead of this machine's
    pub host: Option<String>,
}

pub async fn run(repo_root: PathBuf, opts: BackupOptions) -> Result<()> {
    let id = tokio::task::spawn_blocking(move || backup_snapshot(&repo_root, &opts, Utc::now()))
        .await??;

    println!("snapshot {} saved", id.to_string().yellow());
    Ok(())
}

/// Archive `opts.paths` into a new snapshot with no parent
///
/// Each path is captured in full; its ancestor directories are recorded with
/// only the entries leading to it.
pub fn backup_snapshot(
    repo_root: &Path,
    opts: &BackupOptions,
    now: DateTime<Utc>,
) -> Result<ObjectId> {
    if opts.paths.is_empty() {
        anyhow::bail!("No paths to back up");
    }

    let mut targets = Vec::with_capacity(opts.paths.len());
    for path in &opts.paths {
        let target = path
            .canonicalize()
            .with_context(|| format!("Cannot back up {}", path.display()))?;
        if target.parent().is_none() {
            anyhow::bail!("Backing up the filesystem root is not supported; list its entries instead");
        }
        let target = target
            .to_str()
            .with_context(|| format!("Path is not valid UTF-8: {}", target.display()))?
            .to_string();
        targets.push(target);
    }
    let changes = ChangeSet::from_paths(targets)?;

    let repo = Repository::open(repo_root)
        .with_context(|| format!("Failed to open repository at {}", repo_root.display()))?;
    let _lock = RepoLock::shared(&repo.locks_dir())?;
    repo.load_index()?;

    repo.start_uploader();
    let mut merger = TreeMerger::new(&repo);
    let tree = merger.merge(None, "/", &changes.as_strs())?;
    repo.flush()?;

    let stats = merger.stats();
    tracing::info!(
        "Archived {} paths into tree {}: {} trees, {} files",
        changes.len(),
        tree.short(),
        stats.trees_saved,
        stats.files_saved
    );

    let hostname = opts.host.clone().unwrap_or_else(util::hostname);
    let snapshot = Snapshot::new(
        changes.as_slice().to_vec(),
        opts.tags.clone(),
        hostname,
        util::username(),
        tree,
        now,
    );

    let journal = Journal::open(&repo.snapshots_dir())?;
    let id = journal.append(&snapshot)?;
    repo.stop_uploader()?;

    Ok(id)
}
