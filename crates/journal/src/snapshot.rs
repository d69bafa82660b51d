//! Snapshot records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_core::{hash_bytes, ObjectId};

/// A snapshot: one backup of a set of paths at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken
    pub time: DateTime<Utc>,
    /// Snapshot this one was derived from
    pub parent: Option<ObjectId>,
    /// Root tree
    pub tree: ObjectId,
    /// Backed-up paths
    pub paths: Vec<String>,
    pub hostname: String,
    pub username: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Version of the program that wrote the snapshot
    pub program_version: String,
}

/// Overrides applied when deriving a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotMetadata {
    pub hostname: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl SnapshotMetadata {
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none() && self.time.is_none()
    }
}

/// A snapshot together with its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub id: ObjectId,
    pub snapshot: Snapshot,
}

impl Snapshot {
    /// Create a snapshot with no parent
    pub fn new(
        paths: Vec<String>,
        tags: Vec<String>,
        hostname: String,
        username: String,
        tree: ObjectId,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            time,
            parent: None,
            tree,
            paths,
            hostname,
            username,
            tags,
            program_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Build the successor of `prior` pointing at a new root tree
    ///
    /// Paths and tags carry over. Hostname and time come from `metadata` when
    /// set, otherwise from `prior` and `now`.
    pub fn derive(
        prior: &StoredSnapshot,
        tree: ObjectId,
        metadata: &SnapshotMetadata,
        username: String,
        now: DateTime<Utc>,
    ) -> Self {
        let hostname = metadata
            .hostname
            .clone()
            .unwrap_or_else(|| prior.snapshot.hostname.clone());
        let time = metadata.time.unwrap_or(now);

        let mut snapshot = Self::new(
            prior.snapshot.paths.clone(),
            prior.snapshot.tags.clone(),
            hostname,
            username,
            tree,
            time,
        );
        snapshot.parent = Some(prior.id);
        snapshot
    }

    /// Serialize to JSON bytes
    pub fn serialize(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes
    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Identifier: hash of the serialized bytes
    pub fn id(&self) -> anyhow::Result<ObjectId> {
        Ok(hash_bytes(&self.serialize()?))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
