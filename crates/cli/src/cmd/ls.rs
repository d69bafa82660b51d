//! List the contents of a snapshot

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use strata_core::{Node, NodeKind, ObjectId, Repository};
use strata_journal::SnapshotFilter;

pub async fn run(repo_root: PathBuf, reference: String, filter: SnapshotFilter) -> Result<()> {
    let (id, entries) = tokio::task::spawn_blocking(move || {
        let (repo, journal) = util::open_repo(&repo_root)?;
        let stored = util::resolve_snapshot_ref(&reference, &journal, &filter)?;
        let entries = walk_tree(&repo, stored.snapshot.tree)?;
        anyhow::Ok((stored.id, entries))
    })
    .await??;

    println!("snapshot {}:", id.short().yellow());
    for (path, node) in &entries {
        match node.kind {
            NodeKind::Dir => println!("{}/", path.blue()),
            NodeKind::Symlink => println!(
                "{} -> {}",
                path.cyan(),
                node.link_target.as_deref().unwrap_or("?")
            ),
            NodeKind::File => println!("{} {}", path, util::format_size(node.size).dimmed()),
            NodeKind::Other => println!("{}", path.dimmed()),
        }
    }

    Ok(())
}

/// Every node below `tree` with its absolute path, depth first in name order
pub fn walk_tree(repo: &Repository, tree: ObjectId) -> Result<Vec<(String, Node)>> {
    let mut entries = Vec::new();
    walk_into(repo, tree, "", &mut entries)?;
    Ok(entries)
}

fn walk_into(
    repo: &Repository,
    id: ObjectId,
    prefix: &str,
    entries: &mut Vec<(String, Node)>,
) -> Result<()> {
    let tree = repo.load_tree(&id)?;
    for node in tree.nodes() {
        let path = format!("{}/{}", prefix, node.name);
        let subtree = node.subtree;
        entries.push((path.clone(), node.clone()));
        if let Some(subtree) = subtree {
            walk_into(repo, subtree, &path, entries)?;
        }
    }
    Ok(())
}
