//! Directory entry model

use crate::hash::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Type of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Directory (has a subtree)
    Dir,
    /// Symbolic link
    Symlink,
    /// Device, socket, fifo, ...
    Other,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
            NodeKind::Symlink => "symlink",
            NodeKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// One entry of a directory tree
///
/// Nodes are values: a changed path produces a new `Node`, existing ones are
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// File name, unique within the parent tree
    pub name: String,
    /// Kind of entry
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Unix permission and type bits
    pub mode: u32,
    /// Modification time
    pub mtime: DateTime<Utc>,
    pub uid: u32,
    pub gid: u32,
    /// Size in bytes (regular files only, 0 otherwise)
    pub size: u64,
    pub inode: u64,
    pub device_id: u64,
    pub links: u64,
    /// Target of a symbolic link
    pub link_target: Option<String>,
    /// Data blobs holding the file content
    pub content: Vec<ObjectId>,
    /// Child tree of a directory; `None` is the empty tree
    pub subtree: Option<ObjectId>,
}

impl Node {
    /// Create a node with empty metadata
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mode: 0,
            mtime: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            uid: 0,
            gid: 0,
            size: 0,
            inode: 0,
            device_id: 0,
            links: 0,
            link_target: None,
            content: Vec::new(),
            subtree: None,
        }
    }

    /// Build a node from the filesystem entry at `path`
    ///
    /// Symbolic links are not followed. A missing path surfaces as an
    /// `io::ErrorKind::NotFound` error, which callers treat as a deletion.
    /// File content is not read here; see `Repository::save_file`.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_dir() {
            NodeKind::Dir
        } else if file_type.is_symlink() {
            NodeKind::Symlink
        } else if file_type.is_file() {
            NodeKind::File
        } else {
            NodeKind::Other
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        let link_target = match kind {
            NodeKind::Symlink => Some(fs::read_link(path)?.to_string_lossy().into_owned()),
            _ => None,
        };

        let mtime: DateTime<Utc> = metadata.modified()?.into();
        let size = if kind == NodeKind::File { metadata.len() } else { 0 };

        #[cfg(unix)]
        let (mode, uid, gid, inode, device_id, links) = {
            use std::os::unix::fs::MetadataExt;
            (
                metadata.mode(),
                metadata.uid(),
                metadata.gid(),
                metadata.ino(),
                metadata.dev(),
                metadata.nlink(),
            )
        };
        #[cfg(not(unix))]
        let (mode, uid, gid, inode, device_id, links) = {
            let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
            (mode, 0, 0, 0, 0, 1)
        };

        Ok(Self {
            name,
            kind,
            mode,
            mtime,
            uid,
            gid,
            size,
            inode,
            device_id,
            links,
            link_target,
            content: Vec::new(),
            subtree: None,
        })
    }

    /// Check if this node is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    /// Same node pointing at a different child tree
    pub fn with_subtree(&self, subtree: ObjectId) -> Self {
        Self {
            subtree: Some(subtree),
            ..self.clone()
        }
    }

    /// Same node with its content blobs replaced
    pub fn with_content(self, content: Vec<ObjectId>) -> Self {
        Self { content, ..self }
    }
}
