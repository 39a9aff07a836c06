//! Low-level storage engine trait.
//!
//! Defines [`StorageEngine`], the innermost storage layer: the in-memory
//! scope that holds every entry of every entity the adapter has touched.

use super::entry::StoredEntry;

/// Low-level keyed storage, partitioned by entity name.
///
/// Innermost storage layer. Implementations are in-memory and synchronous;
/// the [`StoreAdapter`](super::StoreAdapter) decides when they are loaded
/// from and flushed to a [`DurableStore`](super::DurableStore).
///
/// Wrapped in `Arc<dyn StorageEngine>` for sharing across threads.
pub trait StorageEngine: Send + Sync + 'static {
    /// Insert or replace an entry. Returns the previous entry if any.
    fn put(&self, entity: &str, key: &str, entry: StoredEntry) -> Option<StoredEntry>;

    /// Retrieve an entry, or `None` if not present.
    fn get(&self, entity: &str, key: &str) -> Option<StoredEntry>;

    /// Remove an entry, returning it.
    fn remove(&self, entity: &str, key: &str) -> Option<StoredEntry>;

    /// Check if a key exists without cloning the entry.
    fn contains_key(&self, entity: &str, key: &str) -> bool;

    /// Number of entries of `entity`.
    fn len(&self, entity: &str) -> usize;

    /// Names of all entities with at least one entry.
    fn entities(&self) -> Vec<String>;

    /// Point-in-time copy of every entry of `entity`.
    ///
    /// The snapshot is mutation-tolerant (concurrent modifications do not fail).
    fn snapshot(&self, entity: &str) -> Vec<StoredEntry>;

    /// Drop every entry of every entity. Takes `&self` for `Arc<dyn StorageEngine>` compatibility.
    fn clear(&self);
}
