//! Latest summary per view and game.

use crate::view::{Summary, SummaryKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Cached {
    /// Snapshot version the summary was derived from.
    version: u64,
    summary: Summary,
}

/// Holds exactly one current summary per key; inserts replace, but never
/// with a summary derived from an older snapshot.
#[derive(Debug, Default)]
pub struct SummaryCache {
    summaries: DashMap<SummaryKey, Cached>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SummaryKey) -> Option<Summary> {
        self.summaries.get(key).map(|c| c.summary.clone())
    }

    /// Snapshot version of the cached summary for `key`.
    pub fn version(&self, key: &SummaryKey) -> Option<u64> {
        self.summaries.get(key).map(|c| c.version)
    }

    /// Store `summary` derived at snapshot `version`. Returns false, leaving
    /// the cache untouched, when a newer summary is already cached.
    pub fn insert(&self, key: SummaryKey, version: u64, summary: Summary) -> bool {
        match self.summaries.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().version > version {
                    return false;
                }
                entry.insert(Cached { version, summary });
            }
            Entry::Vacant(entry) => {
                entry.insert(Cached { version, summary });
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}
