//! Snapshot selection

use crate::snapshot::Snapshot;

/// Criteria a snapshot must meet
///
/// An empty criterion matches everything. `hosts` matches any listed host.
/// Each `tags` entry is a comma-separated tag list whose tags must all be
/// present; the snapshot matches if any entry does. Every entry of `paths`
/// must be among the snapshot's paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    pub hosts: Vec<String>,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
}

impl SnapshotFilter {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.tags.is_empty() && self.paths.is_empty()
    }

    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        if !self.hosts.is_empty() && !self.hosts.iter().any(|h| *h == snapshot.hostname) {
            return false;
        }

        if !self.tags.is_empty() {
            let any_list = self.tags.iter().any(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .all(|tag| snapshot.has_tag(tag))
            });
            if !any_list {
                return false;
            }
        }

        self.paths
            .iter()
            .all(|p| snapshot.paths.iter().any(|sp| sp == p))
    }
}
