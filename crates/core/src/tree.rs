//! Directory trees and their encodings

use crate::error::TreeError;
use crate::hash::{hash_bytes, ObjectId};
use crate::node::Node;
use std::cmp::Ordering;

const MAGIC: &[u8] = b"STR1";

/// The contents of one directory
///
/// Nodes are kept sorted by name (byte-wise) with no duplicates. Once a tree
/// has been saved it is only referenced through its `ObjectId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Create an empty tree with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Insert a node at its sorted position
    pub fn insert(&mut self, node: Node) -> Result<(), TreeError> {
        match self
            .nodes
            .binary_search_by(|existing| existing.name.as_str().cmp(&node.name))
        {
            Ok(_) => Err(TreeError::DuplicateEntry(node.name)),
            Err(pos) => {
                self.nodes.insert(pos, node);
                Ok(())
            }
        }
    }

    /// Look up a node by name
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes
            .binary_search_by(|existing| existing.name.as_str().cmp(name))
            .ok()
            .map(|pos| &self.nodes[pos])
    }

    /// Nodes in sorted order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize the tree to its canonical bytes
    ///
    /// Format:
    /// - magic: "STR1" (4 bytes)
    /// - bincode encoding of the sorted node list
    pub fn serialize(&self) -> Result<Vec<u8>, TreeError> {
        let mut bytes = Vec::with_capacity(MAGIC.len() + self.nodes.len() * 128);
        bytes.extend_from_slice(MAGIC);
        bincode::serialize_into(&mut bytes, &self.nodes)?;
        Ok(bytes)
    }

    /// Deserialize a tree from its canonical bytes
    ///
    /// The sort invariant is checked again so a damaged object cannot leak
    /// an unordered tree into a merge.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TreeError> {
        if bytes.len() < MAGIC.len() {
            return Err(TreeError::Corrupt("too short".to_string()));
        }

        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(TreeError::Corrupt("invalid magic bytes".to_string()));
        }

        let nodes: Vec<Node> = bincode::deserialize(&bytes[MAGIC.len()..])
            .map_err(|e| TreeError::Corrupt(e.to_string()))?;

        for pair in nodes.windows(2) {
            check_order(&pair[0].name, &pair[1].name)?;
        }

        Ok(Self { nodes })
    }

    /// Compute the identifier of this tree
    ///
    /// Deterministic: identical node sequences always produce the same id.
    pub fn id(&self) -> Result<ObjectId, TreeError> {
        Ok(hash_bytes(&self.serialize()?))
    }
}

fn check_order(previous: &str, next: &str) -> Result<(), TreeError> {
    match previous.cmp(next) {
        Ordering::Less => Ok(()),
        Ordering::Equal => Err(TreeError::DuplicateEntry(next.to_string())),
        Ordering::Greater => Err(TreeError::Unsorted {
            previous: previous.to_string(),
            next: next.to_string(),
        }),
    }
}

/// Incremental JSON encoder for a tree
///
/// Nodes must be added in sorted order. The finalized output is
/// `{"nodes":[...]}` followed by a newline and is stored as its own blob,
/// independent of the canonical tree encoding.
pub struct TreeJsonBuilder {
    buf: Vec<u8>,
    last_name: Option<String>,
}

impl TreeJsonBuilder {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(b"{\"nodes\":[");
        Self {
            buf,
            last_name: None,
        }
    }

    /// Append a node; fails if it does not sort after the previous one
    pub fn add_node(&mut self, node: &Node) -> Result<(), TreeError> {
        if let Some(last) = &self.last_name {
            check_order(last, &node.name)?;
            self.buf.push(b',');
        }

        serde_json::to_writer(&mut self.buf, node)?;
        self.last_name = Some(node.name.clone());
        Ok(())
    }

    /// Close the node list and return the encoded bytes
    pub fn finalize(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"]}\n");
        self.buf
    }
}

impl Default for TreeJsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
