//! Durable persistence backend trait for the storage layer.
//!
//! Defines [`DurableStore`], the layer below the in-memory scope. The
//! [`StoreAdapter`](super::StoreAdapter) loads entities from it lazily and
//! writes dirty entries back in one [`PersistBatch`] on `persist()`.

use recordkit_core::{Predicate, Record, StoreKind};

/// Everything one `persist()` call writes, applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistBatch {
    /// Records to insert or replace.
    pub upserts: Vec<Record>,
    /// `(entity, key)` pairs to delete.
    pub removals: Vec<(String, String)>,
}

impl PersistBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Durable backend behind a [`StoreAdapter`](super::StoreAdapter).
///
/// All calls are blocking; the async wrapper moves them off the executor.
///
/// Used as `Arc<dyn DurableStore>`.
pub trait DurableStore: Send + Sync {
    /// What kind of backend this is. Engine-level bulk operations are only
    /// offered by [`StoreKind::Durable`] backends.
    fn kind(&self) -> StoreKind;

    /// Load every stored record of `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load_entity(&self, entity: &str) -> anyhow::Result<Vec<Record>>;

    /// Apply `batch` atomically: either every write lands or none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be committed.
    fn write_batch(&self, batch: &PersistBatch) -> anyhow::Result<()>;

    /// Delete every stored record of `entity` matching `predicate` without
    /// materialising it in memory. Returns the deleted keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not support bulk deletes or the
    /// delete could not be committed.
    fn delete_matching(&self, entity: &str, predicate: &Predicate) -> anyhow::Result<Vec<String>>;

    /// Drop and recreate all stored data.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be reset.
    fn reset(&self) -> anyhow::Result<()>;
}
