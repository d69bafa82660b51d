//! Shared fixture for merge tests

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use strata_core::{Node, NodeKind, ObjectId, ObjectKind, Repository, Tree};
use strata_journal::{MergeStats, TreeMerger};
use tempfile::TempDir;

/// A scratch data directory plus a repository to back it up into
pub struct Fixture {
    _temp: TempDir,
    /// Canonical absolute path of the data directory
    pub data: PathBuf,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let data = temp.path().join("data");
        fs::create_dir(&data)?;
        let data = data.canonicalize()?;
        let repo = Repository::init(&temp.path().join("repo"))?;

        Ok(Self {
            _temp: temp,
            data,
            repo,
        })
    }

    /// Absolute path string for a path relative to the data directory
    pub fn abs(&self, rel: &str) -> String {
        if rel.is_empty() {
            self.data.to_string_lossy().into_owned()
        } else {
            format!("{}/{}", self.data.display(), rel)
        }
    }

    /// Merge prefix for a directory relative to the data directory
    pub fn prefix(&self, rel: &str) -> String {
        format!("{}/", self.abs(rel))
    }

    pub fn write(&self, rel: &str, content: &[u8]) -> Result<String> {
        let path = self.data.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(self.abs(rel))
    }

    pub fn mkdir(&self, rel: &str) -> Result<String> {
        fs::create_dir_all(self.data.join(rel))?;
        Ok(self.abs(rel))
    }

    pub fn remove(&self, rel: &str) -> Result<String> {
        let path = self.data.join(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(self.abs(rel))
    }

    /// Merge relative change-paths into the tree for the data directory
    pub fn merge(&self, prior: Option<ObjectId>, rels: &[&str]) -> Result<(ObjectId, MergeStats)> {
        let mut paths: Vec<String> = rels.iter().map(|r| self.abs(r)).collect();
        paths.sort();
        let changes: Vec<&str> = paths.iter().map(String::as_str).collect();

        let mut merger = TreeMerger::new(&self.repo);
        let id = merger.merge(prior, &self.prefix(""), &changes)?;
        Ok((id, merger.stats()))
    }

    /// Capture the listed entries of the data directory as a fresh tree
    pub fn backup(&self, rels: &[&str]) -> Result<ObjectId> {
        Ok(self.merge(None, rels)?.0)
    }

    /// Node at a relative path below `tree`
    pub fn lookup(&self, tree: ObjectId, rel: &str) -> Result<Option<Node>> {
        let mut current = Some(tree);
        let mut found = None;

        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            let tree = match current {
                Some(id) => self.repo.load_tree(&id)?,
                None => return Ok(None),
            };
            match tree.find(segment) {
                Some(node) => {
                    current = node.subtree;
                    found = Some(node.clone());
                }
                None => return Ok(None),
            }
        }

        Ok(found)
    }

    /// Entry names of the directory at `rel` (empty for the data dir itself)
    pub fn names(&self, tree: ObjectId, rel: &str) -> Result<Vec<String>> {
        let id = if rel.is_empty() {
            Some(tree)
        } else {
            self.lookup(tree, rel)?.and_then(|node| node.subtree)
        };
        let Some(id) = id else {
            return Ok(Vec::new());
        };

        Ok(self
            .repo
            .load_tree(&id)?
            .nodes()
            .iter()
            .map(|n| n.name.clone())
            .collect())
    }

    /// Stored content of a file node
    pub fn content(&self, node: &Node) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for blob in &node.content {
            out.extend(self.repo.load_blob(ObjectKind::Data, blob)?);
        }
        Ok(out)
    }

    /// Save a hand-built tree of empty files
    pub fn save_names(&self, names: &[&str]) -> Result<ObjectId> {
        let mut tree = Tree::new();
        for name in names {
            tree.insert(Node::new(*name, NodeKind::File))?;
        }
        self.repo.save_tree(&tree)
    }

    /// Number of object files on disk
    pub fn object_count(&self) -> Result<usize> {
        let objects = self.repo.root().join("objects");
        Ok(walk_files(&objects)?)
    }
}

fn walk_files(dir: &std::path::Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += walk_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

/// Check every tree reachable from `id` is strictly sorted
pub fn assert_sorted_recursive(repo: &Repository, id: ObjectId) -> Result<usize> {
    let tree = repo.load_tree(&id)?;
    let mut visited = 1;
    for pair in tree.nodes().windows(2) {
        assert!(
            pair[0].name < pair[1].name,
            "unsorted or duplicate entries: {:?} then {:?}",
            pair[0].name,
            pair[1].name
        );
    }
    for node in tree.nodes() {
        if let Some(subtree) = node.subtree {
            visited += assert_sorted_recursive(repo, subtree)?;
        }
    }
    Ok(visited)
}
