//! Shared test doubles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use recordkit_core::{Predicate, PureObject, Record, StoreKind};

use crate::storage::datastores::NullDataStore;
use crate::storage::engines::HashMapStorage;
use crate::storage::{CompositeMutationObserver, DurableStore, MutationObserver, PersistBatch, StoreAdapter};

/// Durable backend kept in a `BTreeMap`, with injectable write failures.
#[derive(Default)]
pub(crate) struct MemoryDurableStore {
    rows: Mutex<BTreeMap<(String, String), Record>>,
    failing_writes: AtomicU32,
    pub(crate) write_calls: AtomicU32,
}

impl MemoryDurableStore {
    /// Makes the next `n` `write_batch` calls fail.
    pub(crate) fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub(crate) fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut rows = self.rows.lock();
        for record in records {
            rows.insert((record.entity.clone(), record.key.clone()), record);
        }
    }

    pub(crate) fn stored(&self, entity: &str) -> Vec<Record> {
        self.rows
            .lock()
            .iter()
            .filter(|((e, _), _)| e == entity)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

impl DurableStore for MemoryDurableStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Durable
    }

    fn load_entity(&self, entity: &str) -> anyhow::Result<Vec<Record>> {
        Ok(self.stored(entity))
    }

    fn write_batch(&self, batch: &PersistBatch) -> anyhow::Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_writes.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("disk full");
        }
        let mut rows = self.rows.lock();
        for record in &batch.upserts {
            rows.insert((record.entity.clone(), record.key.clone()), record.clone());
        }
        for removal in &batch.removals {
            rows.remove(removal);
        }
        Ok(())
    }

    fn delete_matching(&self, entity: &str, predicate: &Predicate) -> anyhow::Result<Vec<String>> {
        let matcher = predicate.matcher()?;
        let mut rows = self.rows.lock();
        let doomed: Vec<(String, String)> = rows
            .iter()
            .filter(|((e, _), r)| e == entity && matcher.matches(r))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            rows.remove(key);
        }
        Ok(doomed.into_iter().map(|(_, key)| key).collect())
    }

    fn reset(&self) -> anyhow::Result<()> {
        self.rows.lock().clear();
        Ok(())
    }
}

pub(crate) fn memory_adapter() -> Arc<StoreAdapter> {
    adapter_with(Arc::new(NullDataStore), Vec::new())
}

pub(crate) fn adapter_with(
    durable: Arc<dyn DurableStore>,
    observers: Vec<Arc<dyn MutationObserver>>,
) -> Arc<StoreAdapter> {
    Arc::new(StoreAdapter::new(
        Arc::new(HashMapStorage::new()),
        durable,
        Arc::new(CompositeMutationObserver::new(observers)),
    ))
}

/// Small domain type used across store tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dummy {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) rank: i64,
    pub(crate) version: u64,
}

impl Dummy {
    pub(crate) fn new(id: &str, title: &str, rank: i64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            rank,
            version: 1,
        }
    }
}

impl PureObject for Dummy {
    const ENTITY: &'static str = "dummy";

    fn to_record(&self) -> Record {
        Record::new(Self::ENTITY, &self.id)
            .with_version(self.version)
            .with_field("title", self.title.as_str())
            .with_field("rank", self.rank)
    }

    fn from_record(record: &Record) -> anyhow::Result<Self> {
        Ok(Self {
            id: record.key.clone(),
            title: record.require_str("title")?.to_string(),
            rank: record.require_i64("rank")?,
            version: record.version,
        })
    }
}

pub(crate) fn dummies(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let rank = i64::try_from(i).unwrap_or(i64::MAX);
            Dummy::new(&format!("{i:04}"), &format!("item {i}"), rank).to_record()
        })
        .collect()
}
