//! Incremental tree merge
//!
//! Rebuilds only the directories on the path from the root to each change.
//! Every untouched subtree keeps its identifier, so a snapshot produced this
//! way shares all unchanged objects with the one it was derived from.
//!
//! At each directory the prior tree's nodes and the change-paths falling
//! below the directory are merge-joined in name order:
//!
//! - a node with no change is copied as is, subtree id included
//! - a change with no node is an insertion (or inert, if the path is gone)
//! - a node with a change is re-stat'ed, recursed into, or dropped
//!
//! Recursion depth equals directory depth.

use crate::archive::archive_dir;
use anyhow::{Context, Result};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use std::sync::Arc;
use strata_core::{Node, NodeKind, ObjectId, ObjectKind, Repository, Tree, TreeJsonBuilder};

/// Counters collected during a merge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Trees written (including ones already present)
    pub trees_saved: usize,
    /// Subtrees reused by id without loading them
    pub trees_reused: usize,
    /// Regular files whose content was stored
    pub files_saved: usize,
    /// Directories captured by a full walk
    pub dirs_archived: usize,
    /// Entries removed because their path no longer exists
    pub removed: usize,
}

/// Change-paths sharing one entry name below the current directory
#[derive(Debug, PartialEq, Eq)]
struct ChangeGroup<'a> {
    name: &'a str,
    /// A change-path names the entry itself
    direct: bool,
    /// Change-paths below the entry, sorted
    nested: SmallVec<[&'a str; 4]>,
}

/// Merges change-paths into stored trees
pub struct TreeMerger<'r> {
    repo: &'r Repository,
    stats: MergeStats,
}

impl<'r> TreeMerger<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self {
            repo,
            stats: MergeStats::default(),
        }
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut MergeStats {
        &mut self.stats
    }

    pub(crate) fn repo(&self) -> &'r Repository {
        self.repo
    }

    /// Merge `changes` into the tree `prior` describing directory `dir`
    ///
    /// `dir` is absolute and ends in "/" (the root is "/"). `changes` must be
    /// sorted; paths outside `dir` are ignored. `None` stands for the empty
    /// tree. Returns the id of the resulting tree, which is `prior` itself
    /// when there is nothing to apply.
    pub fn merge(
        &mut self,
        prior: Option<ObjectId>,
        dir: &str,
        changes: &[&str],
    ) -> Result<ObjectId> {
        debug_assert!(dir.ends_with('/'), "directory prefix must end in '/': {dir}");
        debug_assert!(
            changes.windows(2).all(|w| w[0] <= w[1]),
            "change paths must be sorted"
        );

        if changes.is_empty() {
            if let Some(id) = prior {
                self.stats.trees_reused += 1;
                return Ok(id);
            }
        }

        self.repo.check_cancelled()?;

        let old = match prior {
            Some(id) => self
                .repo
                .load_tree(&id)
                .with_context(|| format!("Failed to load tree for {}", dir))?,
            None => Arc::new(Tree::new()),
        };

        let groups = group_changes(dir, changes);
        tracing::trace!(
            "Merging {} ({} entries, {} changed names)",
            dir,
            old.len(),
            groups.len()
        );

        let mut tree = Tree::with_capacity(old.len() + groups.len());
        let nodes = old.nodes();
        let (mut i, mut j) = (0, 0);

        loop {
            let ordering = match (nodes.get(i), groups.get(j)) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(node), Some(group)) => node.name.as_str().cmp(group.name),
            };

            match ordering {
                Ordering::Less => {
                    // Unchanged; directories keep their subtree id
                    tree.insert(nodes[i].clone())?;
                    i += 1;
                }
                Ordering::Greater => {
                    if let Some(node) = self.reconcile(dir, None, &groups[j])? {
                        tree.insert(node)?;
                    }
                    j += 1;
                }
                Ordering::Equal => {
                    if let Some(node) = self.reconcile(dir, Some(&nodes[i]), &groups[j])? {
                        tree.insert(node)?;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        save_tree_with_json(self.repo, &tree, &mut self.stats)
    }

    /// Produce the node for one changed name, or `None` if it is gone
    fn reconcile(
        &mut self,
        dir: &str,
        prior: Option<&Node>,
        group: &ChangeGroup<'_>,
    ) -> Result<Option<Node>> {
        let path = format!("{}{}", dir, group.name);
        let child_dir = format!("{}/", path);

        // Only descendants changed and the entry is still a directory
        if !group.direct {
            if let Some(node) = prior.filter(|n| n.is_dir()) {
                let subtree = self.merge(node.subtree, &child_dir, &group.nested)?;
                return Ok(Some(node.with_subtree(subtree)));
            }
        }

        let fresh = match Node::from_path(Path::new(&path)) {
            Ok(node) => node,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.vanished(&path, prior);
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", path));
            }
        };

        let mut fresh = Node {
            name: group.name.to_string(),
            ..fresh
        };

        match fresh.kind {
            NodeKind::File => {
                let blob = match self.repo.save_file(Path::new(&path)) {
                    Ok(blob) => blob,
                    // Removed between the stat and the read
                    Err(e) if is_not_found(&e) => {
                        self.vanished(&path, prior);
                        return Ok(None);
                    }
                    Err(e) => return Err(e.context(format!("Failed to save {}", path))),
                };
                self.stats.files_saved += 1;
                fresh = fresh.with_content(vec![blob]);
            }
            NodeKind::Dir => {
                let subtree = match prior {
                    Some(node) if node.is_dir() => {
                        self.merge(node.subtree, &child_dir, &group.nested)?
                    }
                    // Parent created only to hold listed descendants
                    None if !group.direct => self.merge(None, &child_dir, &group.nested)?,
                    _ => archive_dir(self, Path::new(&path))?,
                };
                fresh.subtree = Some(subtree);
            }
            NodeKind::Symlink | NodeKind::Other => {}
        }

        Ok(Some(fresh))
    }

    /// Record a change-path that no longer exists
    ///
    /// With a prior node this is a deletion; otherwise the path is inert.
    fn vanished(&mut self, path: &str, prior: Option<&Node>) {
        if prior.is_some() {
            tracing::info!("Removed {}", path);
            self.stats.removed += 1;
        } else {
            tracing::debug!("Skipping {}: no such file or directory", path);
        }
    }
}

/// True if any error in the chain is an `io::ErrorKind::NotFound`
pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map_or(false, |e| e.kind() == io::ErrorKind::NotFound)
    })
}

/// Group the change-paths below `dir` by their first path segment
///
/// Paths equal to `dir` or outside it are dropped, as are empty, "." and ".."
/// segments. Ownership is decided by whole segments, so "/docs2" never lands
/// in the group for "docs".
fn group_changes<'a>(dir: &str, changes: &[&'a str]) -> Vec<ChangeGroup<'a>> {
    let mut entries: Vec<(&'a str, Option<&'a str>)> = changes
        .iter()
        .filter_map(|&path| {
            let rest = path.strip_prefix(dir)?;
            if rest.is_empty() {
                return None;
            }
            Some(match rest.split_once('/') {
                Some((name, _)) => (name, Some(path)),
                None => (rest, None),
            })
        })
        .filter(|(name, _)| !matches!(*name, "" | "." | ".."))
        .collect();

    // "/a/x" sorts after "/a.txt" but its name "a" sorts before "a.txt";
    // the stable sort keeps nested paths in their original order.
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut groups: Vec<ChangeGroup<'a>> = Vec::new();
    for (name, nested) in entries {
        if groups.last().map_or(true, |last| last.name != name) {
            groups.push(ChangeGroup {
                name,
                direct: false,
                nested: SmallVec::new(),
            });
        }
        if let Some(group) = groups.last_mut() {
            match nested {
                Some(path) => group.nested.push(path),
                None => group.direct = true,
            }
        }
    }

    groups
}

/// Persist a tree and its JSON rendering; returns the tree id
pub(crate) fn save_tree_with_json(
    repo: &Repository,
    tree: &Tree,
    stats: &mut MergeStats,
) -> Result<ObjectId> {
    let mut json = TreeJsonBuilder::new();
    for node in tree.nodes() {
        json.add_node(node)?;
    }
    repo.save_blob(ObjectKind::TreeJson, &json.finalize())?;

    let id = repo.save_tree(tree)?;
    stats.trees_saved += 1;
    Ok(id)
}
