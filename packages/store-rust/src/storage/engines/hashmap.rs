//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. Readers
//! snapshot a table while the main scope keeps writing to it.

use dashmap::DashMap;

use crate::storage::engine::StorageEngine;
use crate::storage::entry::StoredEntry;

type Table = DashMap<String, StoredEntry>;

/// In-memory storage: one [`DashMap`] table per entity.
///
/// Tables are created on first write and removed once they become empty, so
/// [`entities`](StorageEngine::entities) only lists populated entities.
pub struct HashMapStorage {
    tables: DashMap<String, Table>,
}

impl HashMapStorage {
    /// Creates a new, empty `HashMapStorage`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
        }
    }
}

impl Default for HashMapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for HashMapStorage {
    fn put(&self, entity: &str, key: &str, entry: StoredEntry) -> Option<StoredEntry> {
        self.tables
            .entry(entity.to_string())
            .or_default()
            .insert(key.to_string(), entry)
    }

    fn get(&self, entity: &str, key: &str) -> Option<StoredEntry> {
        self.tables
            .get(entity)
            .and_then(|table| table.get(key).map(|e| e.clone()))
    }

    fn remove(&self, entity: &str, key: &str) -> Option<StoredEntry> {
        let removed = self
            .tables
            .get(entity)
            .and_then(|table| table.remove(key).map(|(_, e)| e));
        if removed.is_some() {
            self.tables.remove_if(entity, |_, table| table.is_empty());
        }
        removed
    }

    fn contains_key(&self, entity: &str, key: &str) -> bool {
        self.tables
            .get(entity)
            .is_some_and(|table| table.contains_key(key))
    }

    fn len(&self, entity: &str) -> usize {
        self.tables.get(entity).map_or(0, |table| table.len())
    }

    fn entities(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.key().clone()).collect()
    }

    fn snapshot(&self, entity: &str) -> Vec<StoredEntry> {
        self.tables.get(entity).map_or_else(Vec::new, |table| {
            table.iter().map(|e| e.value().clone()).collect()
        })
    }

    fn clear(&self) {
        self.tables.clear();
    }
}
