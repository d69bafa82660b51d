//! Full capture of a directory that has no prior tree

use crate::incremental::{is_not_found, save_tree_with_json, TreeMerger};
use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use strata_core::{Node, NodeKind, ObjectId, Tree, TreeError};
use walkdir::WalkDir;

/// Walk `path` and store its whole contents; returns the tree id
///
/// Entries that vanish during the walk are skipped.
pub(crate) fn archive_dir(merger: &mut TreeMerger<'_>, path: &Path) -> Result<ObjectId> {
    let repo = merger.repo();
    repo.check_cancelled()?;

    let mut tree = Tree::new();
    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) => {
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let entry_path = entry.path();
        let mut node = match Node::from_path(entry_path) {
            Ok(node) => node,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", entry_path.display()));
            }
        };

        match node.kind {
            NodeKind::File => {
                let blob = match repo.save_file(entry_path) {
                    Ok(blob) => blob,
                    Err(e) if is_not_found(&e) => continue,
                    Err(e) => {
                        return Err(e.context(format!("Failed to save {}", entry_path.display())))
                    }
                };
                merger.stats_mut().files_saved += 1;
                node = node.with_content(vec![blob]);
            }
            NodeKind::Dir => {
                node.subtree = Some(archive_dir(merger, entry_path)?);
            }
            NodeKind::Symlink | NodeKind::Other => {}
        }

        match tree.insert(node) {
            Ok(()) => {}
            Err(TreeError::DuplicateEntry(name)) => {
                // Distinct non-UTF-8 names can render identically
                tracing::warn!(
                    "Skipping {}: duplicate entry name {:?}",
                    entry_path.display(),
                    name
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    merger.stats_mut().dirs_archived += 1;
    tracing::debug!("Archived {} ({} entries)", path.display(), tree.len());
    save_tree_with_json(repo, &tree, merger.stats_mut())
}
