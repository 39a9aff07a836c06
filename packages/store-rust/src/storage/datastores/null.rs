//! No-op [`DurableStore`] implementation.
//!
//! [`NullDataStore`] discards all writes and returns empty results for reads.
//! A store built on it is a pure in-memory store: `persist()` succeeds as a
//! no-op and engine-level bulk deletes are unsupported.

use recordkit_core::{Predicate, Record, StoreKind};

use crate::storage::durable_store::{DurableStore, PersistBatch};

/// No-op `DurableStore` for in-memory stores and tests.
pub struct NullDataStore;

impl DurableStore for NullDataStore {
    fn kind(&self) -> StoreKind {
        StoreKind::InMemory
    }

    fn load_entity(&self, _entity: &str) -> anyhow::Result<Vec<Record>> {
        Ok(Vec::new())
    }

    fn write_batch(&self, _batch: &PersistBatch) -> anyhow::Result<()> {
        Ok(())
    }

    fn delete_matching(&self, entity: &str, _predicate: &Predicate) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("bulk delete of {entity} requires a durable store")
    }

    fn reset(&self) -> anyhow::Result<()> {
        // Nothing to reset: NullDataStore holds no state.
        Ok(())
    }
}
