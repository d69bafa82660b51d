//! List snapshots

use crate::util;
use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use strata_journal::SnapshotFilter;

pub async fn run(repo_root: PathBuf, filter: SnapshotFilter) -> Result<()> {
    let snapshots = tokio::task::spawn_blocking(move || {
        let (_repo, journal) = util::open_repo(&repo_root)?;
        journal.list(&filter)
    })
    .await??;

    if snapshots.is_empty() {
        println!("{}", "No snapshots".dimmed());
        return Ok(());
    }

    let now = Utc::now();
    for stored in &snapshots {
        util::display_snapshot_compact(stored, now);
    }
    println!();
    println!("{} snapshots", snapshots.len());

    Ok(())
}
