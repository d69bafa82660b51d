//! Snapshot journal using sled

use crate::error::IncrementalError;
use crate::filter::SnapshotFilter;
use crate::snapshot::{Snapshot, StoredSnapshot};
use anyhow::Result;
use parking_lot::RwLock;
use sled::Db;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_core::{hash_bytes, ObjectId};

/// Append-only store of snapshots
///
/// Entries are keyed by a monotonic sequence number; the value is the
/// snapshot's JSON bytes, whose hash is the snapshot id.
pub struct Journal {
    db: Db,
    /// In-memory index: snapshot id -> sequence number
    index: RwLock<BTreeMap<ObjectId, u64>>,
    seq_counter: AtomicU64,
}

impl Journal {
    /// Open or create a journal in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join("journal.db"))?;

        let mut index = BTreeMap::new();
        let mut max_seq = 0u64;

        for item in db.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into()?);
            max_seq = max_seq.max(seq);

            if let Err(e) = Snapshot::deserialize(&value) {
                tracing::warn!("Skipping unreadable snapshot at seq {}: {}", seq, e);
                continue;
            }
            index.insert(hash_bytes(&value), seq);
        }

        tracing::debug!("Opened journal with {} snapshots", index.len());

        Ok(Self {
            db,
            index: RwLock::new(index),
            seq_counter: AtomicU64::new(max_seq + 1),
        })
    }

    /// Append a snapshot and return its id
    ///
    /// Appending a snapshot that is already present is a no-op.
    pub fn append(&self, snapshot: &Snapshot) -> Result<ObjectId> {
        let value = snapshot.serialize()?;
        let id = hash_bytes(&value);

        let mut index = self.index.write();
        if index.contains_key(&id) {
            return Ok(id);
        }

        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        // Big-endian keys iterate in append order
        self.db.insert(seq.to_be_bytes(), value)?;
        self.db.flush()?;

        index.insert(id, seq);
        Ok(id)
    }

    /// Get a snapshot by id
    pub fn get(&self, id: &ObjectId) -> Result<Option<Snapshot>> {
        let seq = match self.index.read().get(id) {
            Some(&seq) => seq,
            None => return Ok(None),
        };
        self.load(seq)
    }

    /// Resolve a full id or unique hex prefix
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<StoredSnapshot>> {
        let prefix = prefix.to_ascii_lowercase();
        let matches: Vec<ObjectId> = self
            .index
            .read()
            .keys()
            .filter(|id| id.to_hex().starts_with(&prefix))
            .copied()
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [id] => Ok(self
                .get(id)?
                .map(|snapshot| StoredSnapshot { id: *id, snapshot })),
            _ => Err(IncrementalError::AmbiguousPrefix(prefix).into()),
        }
    }

    /// Most recent snapshot by time
    pub fn latest(&self) -> Result<Option<StoredSnapshot>> {
        self.find_latest(&SnapshotFilter::default())
    }

    /// Most recent snapshot matching `filter`
    ///
    /// Ties on time go to the later append.
    pub fn find_latest(&self, filter: &SnapshotFilter) -> Result<Option<StoredSnapshot>> {
        let mut best: Option<(u64, StoredSnapshot)> = None;

        for (seq, stored) in self.entries()? {
            if !filter.matches(&stored.snapshot) {
                continue;
            }
            let newer = match &best {
                None => true,
                Some((best_seq, current)) => {
                    (stored.snapshot.time, seq) > (current.snapshot.time, *best_seq)
                }
            };
            if newer {
                best = Some((seq, stored));
            }
        }

        Ok(best.map(|(_, stored)| stored))
    }

    /// All snapshots matching `filter`, oldest first
    pub fn list(&self, filter: &SnapshotFilter) -> Result<Vec<StoredSnapshot>> {
        let mut snapshots: Vec<StoredSnapshot> = self
            .entries()?
            .into_iter()
            .map(|(_, stored)| stored)
            .filter(|stored| filter.matches(&stored.snapshot))
            .collect();
        snapshots.sort_by(|a, b| a.snapshot.time.cmp(&b.snapshot.time));
        Ok(snapshots)
    }

    /// Remove a snapshot; returns false if it was not present
    pub fn delete(&self, id: &ObjectId) -> Result<bool> {
        let seq = match self.index.write().remove(id) {
            Some(seq) => seq,
            None => return Ok(false),
        };

        self.db.remove(seq.to_be_bytes())?;
        self.db.flush()?;
        Ok(true)
    }

    /// Number of snapshots
    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    fn load(&self, seq: u64) -> Result<Option<Snapshot>> {
        match self.db.get(seq.to_be_bytes())? {
            Some(value) => Ok(Some(Snapshot::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn entries(&self) -> Result<Vec<(u64, StoredSnapshot)>> {
        let index: Vec<(ObjectId, u64)> = self
            .index
            .read()
            .iter()
            .map(|(id, seq)| (*id, *seq))
            .collect();

        let mut entries = Vec::with_capacity(index.len());
        for (id, seq) in index {
            if let Some(snapshot) = self.load(seq)? {
                entries.push((seq, StoredSnapshot { id, snapshot }));
            }
        }
        Ok(entries)
    }
}
