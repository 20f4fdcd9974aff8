//! Change-sets and the merged, versioned snapshot.

use crate::path::PathKey;
use crate::value::StateValue;
use std::collections::HashMap;
use tracing::trace;

/// One `(key, value)` pair from an upstream message, with its parsed path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub key: String,
    /// `None` when the key does not parse; such keys are stored but never match a pattern.
    pub path: Option<PathKey>,
    pub value: StateValue,
}

impl ChangeEntry {
    pub fn new(key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        let key = key.into();
        let path = PathKey::parse(&key).ok();
        Self {
            key,
            path,
            value: value.into(),
        }
    }
}

/// The pairs delivered by a single upstream message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.entries.push(ChangeEntry::new(key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Parsed paths of this change-set (unparseable keys skipped).
    pub fn paths(&self) -> impl Iterator<Item = &PathKey> {
        self.entries.iter().filter_map(|e| e.path.as_ref())
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| ChangeEntry::new(k, v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    path: Option<PathKey>,
    value: StateValue,
}

/// Every key seen so far with its latest value.
///
/// Keys are never removed; a merge inserts or overwrites (last write wins).
/// `version` increases by one per merged change-set.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<String, Entry>,
    version: u64,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a change-set. Returns the keys that were inserted or whose value changed.
    pub fn merge(&mut self, changes: &ChangeSet) -> Vec<String> {
        let mut affected = Vec::new();

        for change in changes.iter() {
            match self.entries.get_mut(&change.key) {
                Some(entry) if entry.value == change.value => {}
                Some(entry) => {
                    entry.value = change.value.clone();
                    affected.push(change.key.clone());
                }
                None => {
                    self.entries.insert(
                        change.key.clone(),
                        Entry {
                            path: change.path.clone(),
                            value: change.value.clone(),
                        },
                    );
                    affected.push(change.key.clone());
                }
            }
        }

        self.version += 1;
        trace!(
            "Snapshot v{} merged {} changes ({} affected, {} keys)",
            self.version,
            changes.len(),
            affected.len(),
            self.entries.len()
        );

        affected
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Parsed paths with their values (unparseable keys skipped).
    pub fn paths(&self) -> impl Iterator<Item = (&PathKey, &StateValue)> {
        self.entries
            .values()
            .filter_map(|e| e.path.as_ref().map(|p| (p, &e.value)))
    }
}
