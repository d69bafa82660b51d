//! Initialize a repository

use anyhow::Result;
use std::path::PathBuf;
use strata_core::Repository;

pub async fn run(repo_root: PathBuf) -> Result<()> {
    println!("Initializing Strata repository at {}", repo_root.display());

    let root = repo_root.clone();
    let repo = tokio::task::spawn_blocking(move || Repository::init(&root)).await??;

    println!("Successfully initialized Strata repository");
    println!();
    println!("Created directory structure:");
    println!("  - objects/     (trees and file content)");
    println!("  - snapshots/   (snapshot journal)");
    println!("  - locks/       (repository locks)");
    println!("  - config.toml  (store and upload settings)");
    println!();
    println!(
        "Upload workers: {}, queue depth: {}",
        repo.config().upload.workers,
        repo.config().upload.queue_depth
    );
    Ok(())
}
