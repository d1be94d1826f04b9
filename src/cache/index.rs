//! Entry Index Module
//!
//! In-memory record of which keys currently have a persisted record.

use std::collections::HashSet;

// == Entry Index ==
/// Presence set of sanitized keys.
///
/// A key in the index implies a record was written for it. The converse is
/// only eventually true: readers that find the record missing call
/// [`EntryIndex::unmark`] and treat the key as absent.
#[derive(Debug, Default, Clone)]
pub struct EntryIndex {
    keys: HashSet<String>,
}

impl EntryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an index from an existing storage listing.
    pub fn seeded<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn mark(&mut self, key: &str) {
        self.keys.insert(key.to_string());
    }

    /// Clears `key`, returning whether it was present.
    pub fn unmark(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Snapshot of the indexed keys, sorted for stable iteration.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.iter().cloned().collect();
        keys.sort();
        keys
    }

    pub fn reset(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
