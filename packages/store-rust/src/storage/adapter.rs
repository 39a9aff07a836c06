//! Synchronous facade over the in-memory scope and its durable backend.
//!
//! [`StoreAdapter`] owns the one mutable "main" scope. Entities are loaded
//! lazily from the [`DurableStore`] on first touch, mutated in a
//! [`StorageEngine`], and flushed back in a single [`PersistBatch`] by
//! [`StoreAdapter::persist`]. Every call is blocking; the async
//! [`StoreContext`](crate::service::StoreContext) decides which thread runs it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashSet;
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use recordkit_core::{
    sort_records, FetchQuery, Matcher, Operation, Predicate, Record, StoreError, StoreKind,
};
use tracing::{debug, info, warn};

use super::durable_store::{DurableStore, PersistBatch};
use super::engine::StorageEngine;
use super::entry::{now_millis, EntryMetadata, StoredEntry};
use super::mutation_observer::{CompositeMutationObserver, MutationObserver};

/// Whether the adapter currently has a live backend.
///
/// State machine: Connected <-> Disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Exclusive hold on the main scope.
///
/// Notifies observers that the scope committed when dropped, but only if
/// something was written under it. The lock is released after the
/// notification.
struct MainScope<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
    observer: &'a CompositeMutationObserver,
    touched: bool,
}

impl MainScope<'_> {
    fn touch(&mut self) {
        self.touched = true;
    }
}

impl Drop for MainScope<'_> {
    fn drop(&mut self) {
        if self.touched {
            self.observer.on_scope_committed();
        }
    }
}

fn backend_error(err: &anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{err:#}"))
}

fn compile(predicate: &Predicate) -> Result<Matcher, StoreError> {
    predicate
        .matcher()
        .map_err(|e| StoreError::Backend(format!("invalid predicate: {e}")))
}

/// Blocking store facade used by every request.
pub struct StoreAdapter {
    engine: Arc<dyn StorageEngine>,
    durable: Arc<dyn DurableStore>,
    observer: Arc<CompositeMutationObserver>,
    main: RwLock<()>,
    load: Mutex<()>,
    revision: AtomicU64,
    loaded: DashSet<String>,
    tombstones: DashSet<(String, String)>,
    connection: ArcSwap<ConnectionState>,
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter").finish_non_exhaustive()
    }
}

impl StoreAdapter {
    #[must_use]
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        durable: Arc<dyn DurableStore>,
        observer: Arc<CompositeMutationObserver>,
    ) -> Self {
        Self {
            engine,
            durable,
            observer,
            main: RwLock::new(()),
            load: Mutex::new(()),
            revision: AtomicU64::new(0),
            loaded: DashSet::new(),
            tombstones: DashSet::new(),
            connection: ArcSwap::from_pointee(ConnectionState::Connected),
        }
    }

    /// Kind of the durable backend behind this adapter.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.durable.kind()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        **self.connection.load()
    }

    /// Marks the backend as gone. Every call fails with
    /// [`StoreError::Unavailable`] until [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.connection.store(Arc::new(ConnectionState::Disconnected));
        warn!("store adapter disconnected");
    }

    pub fn connect(&self) {
        self.connection.store(Arc::new(ConnectionState::Connected));
        info!("store adapter connected");
    }

    /// Returns `true` if the in-memory scope holds unflushed changes.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.tombstones.is_empty()
            || self.engine.entities().iter().any(|entity| {
                self.engine
                    .snapshot(entity)
                    .iter()
                    .any(|entry| entry.metadata.is_dirty())
            })
    }

    // --- Reads ---

    /// Fetches the records of `query.entity` matching its predicate, sorted
    /// by its descriptors (then by primary key) and windowed by offset and
    /// limit. No match is an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] while disconnected and
    /// [`StoreError::Backend`] if the entity cannot be loaded or the
    /// predicate does not compile.
    pub fn fetch(&self, query: &FetchQuery) -> Result<Vec<Record>, StoreError> {
        self.ensure_connected()?;
        let matcher = compile(&query.predicate)?;
        let _read = self.main.read();
        self.ensure_loaded(&query.entity)?;

        let mut records: Vec<Record> = self
            .engine
            .snapshot(&query.entity)
            .into_iter()
            .map(|entry| entry.record)
            .filter(|record| matcher.matches(record))
            .collect();
        sort_records(&mut records, &query.sort);

        Ok(records
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Looks up `keys` of `entity` directly in the engine. Missing keys are
    /// skipped; the result follows the order of `keys`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub fn get_many(&self, entity: &str, keys: &[&str]) -> Result<Vec<Record>, StoreError> {
        self.ensure_connected()?;
        let _read = self.main.read();
        self.ensure_loaded(entity)?;
        Ok(keys
            .iter()
            .filter_map(|key| self.engine.get(entity, key))
            .map(|entry| entry.record)
            .collect())
    }

    // --- Mutations ---

    /// Inserts or replaces `records` in the in-memory scope. Nothing is
    /// durable until [`persist`](Self::persist).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] while disconnected or
    /// [`StoreError::Backend`] if an entity cannot be loaded first.
    pub fn save(&self, records: &[Record]) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let mut scope = self.main_scope();
        self.ensure_all_loaded(records)?;
        self.save_in(&mut scope, records);
        Ok(())
    }

    /// Removes `records` (matched by entity and primary key) from the
    /// in-memory scope. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] while disconnected or
    /// [`StoreError::Backend`] if an entity cannot be loaded first.
    pub fn delete(&self, records: &[Record]) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let mut scope = self.main_scope();
        self.ensure_all_loaded(records)?;
        self.delete_in(&mut scope, records);
        Ok(())
    }

    /// Deletes `stale` and then saves `writes` under one hold of the main
    /// scope, so observers see a single commit. A stale key that `writes`
    /// puts back is updated in place rather than removed.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save).
    pub fn replace(&self, stale: &[Record], writes: &[Record]) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let mut scope = self.main_scope();
        self.ensure_all_loaded(stale)?;
        self.ensure_all_loaded(writes)?;
        let rewritten: HashSet<(&str, &str)> = writes
            .iter()
            .map(|r| (r.entity.as_str(), r.key.as_str()))
            .collect();
        let removed: Vec<Record> = stale
            .iter()
            .filter(|r| !rewritten.contains(&(r.entity.as_str(), r.key.as_str())))
            .cloned()
            .collect();
        self.delete_in(&mut scope, &removed);
        self.save_in(&mut scope, writes);
        Ok(())
    }

    /// Flushes every dirty entry and pending removal to the durable store in
    /// one batch. Returns the number of flushed changes.
    ///
    /// A failed flush leaves the scope dirty, so calling again retries the
    /// same batch. Flushing a clean scope is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PersistFailure`] if the batch was not committed.
    pub fn persist(&self) -> Result<usize, StoreError> {
        self.ensure_connected()?;
        let _scope = self.main_scope();

        let mut batch = PersistBatch::default();
        for entity in self.engine.entities() {
            batch.upserts.extend(
                self.engine
                    .snapshot(&entity)
                    .into_iter()
                    .filter(|entry| entry.metadata.is_dirty())
                    .map(|entry| entry.record),
            );
        }
        batch.removals = self.tombstones.iter().map(|t| t.key().clone()).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        self.durable
            .write_batch(&batch)
            .map_err(|e| StoreError::PersistFailure(format!("{e:#}")))?;

        let now = now_millis();
        for record in &batch.upserts {
            if let Some(mut entry) = self.engine.get(&record.entity, &record.key) {
                entry.metadata.on_store(now);
                self.engine.put(&record.entity, &record.key, entry);
            }
        }
        for removal in &batch.removals {
            self.tombstones.remove(removal);
        }

        let flushed = batch.upserts.len() + batch.removals.len();
        self.observer.on_persist(flushed);
        info!(
            upserts = batch.upserts.len(),
            removals = batch.removals.len(),
            "persisted main scope"
        );
        Ok(flushed)
    }

    /// Deletes every record of `entity` matching `predicate` inside the
    /// durable backend, then evicts the same keys (and any cached entry that
    /// matches) from the in-memory scope. Returns the number of durable
    /// records deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedForStoreKind`] against an in-memory
    /// store and [`StoreError::Backend`] if the backend delete fails.
    pub fn batch_delete(&self, entity: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        self.ensure_connected()?;
        let kind = self.kind();
        if kind != StoreKind::Durable {
            return Err(StoreError::UnsupportedForStoreKind {
                operation: Operation::BatchDelete,
                kind,
            });
        }
        let matcher = compile(predicate)?;
        let mut scope = self.main_scope();

        let deleted: HashSet<String> = self
            .durable
            .delete_matching(entity, predicate)
            .map_err(|e| backend_error(&e))?
            .into_iter()
            .collect();

        for entry in self.engine.snapshot(entity) {
            let key = &entry.record.key;
            if !deleted.contains(key) && !matcher.matches(&entry.record) {
                continue;
            }
            if let Some(old) = self.engine.remove(entity, key) {
                self.observer.on_remove(&old.record);
                scope.touch();
            }
            self.tombstones.remove(&(entity.to_string(), key.clone()));
        }

        info!(entity, deleted = deleted.len(), "batch delete committed");
        Ok(deleted.len())
    }

    /// Drops every in-memory entry and recreates the durable storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend could not be reset.
    pub fn reset_store(&self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let _scope = self.main_scope();
        let _load = self.load.lock();

        self.engine.clear();
        self.tombstones.clear();
        self.loaded.clear();
        self.durable.reset().map_err(|e| backend_error(&e))?;
        self.observer.on_reset();
        info!("store reset");
        Ok(())
    }

    // --- Internals ---

    fn save_in(&self, scope: &mut MainScope<'_>, records: &[Record]) {
        let now = now_millis();
        for record in records {
            let revision = self.next_revision();
            let previous = self.engine.get(&record.entity, &record.key);
            let metadata = match &previous {
                Some(prev) => {
                    let mut metadata = prev.metadata.clone();
                    metadata.on_update(now, revision);
                    metadata
                }
                None => EntryMetadata::new(now, revision),
            };
            self.engine.put(
                &record.entity,
                &record.key,
                StoredEntry {
                    record: record.clone(),
                    metadata,
                },
            );
            self.tombstones
                .remove(&(record.entity.clone(), record.key.clone()));

            match previous {
                Some(prev) => self.observer.on_update(&prev.record, record),
                None => self.observer.on_insert(record),
            }
            scope.touch();
        }
        debug!(count = records.len(), "saved records to main scope");
    }

    fn delete_in(&self, scope: &mut MainScope<'_>, records: &[Record]) {
        let durable = self.kind() == StoreKind::Durable;
        let mut removed = 0_usize;
        for record in records {
            if let Some(old) = self.engine.remove(&record.entity, &record.key) {
                if durable {
                    self.tombstones
                        .insert((record.entity.clone(), record.key.clone()));
                }
                self.observer.on_remove(&old.record);
                scope.touch();
                removed += 1;
            }
        }
        debug!(requested = records.len(), removed, "deleted records from main scope");
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        match self.connection_state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(StoreError::Unavailable),
        }
    }

    fn main_scope(&self) -> MainScope<'_> {
        MainScope {
            _guard: self.main.write(),
            observer: &self.observer,
            touched: false,
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn ensure_all_loaded(&self, records: &[Record]) -> Result<(), StoreError> {
        let entities: HashSet<&str> = records.iter().map(|r| r.entity.as_str()).collect();
        for entity in entities {
            self.ensure_loaded(entity)?;
        }
        Ok(())
    }

    /// Pulls `entity` from the durable store into the engine once. Keys
    /// already in the scope or pending removal keep their in-memory state.
    fn ensure_loaded(&self, entity: &str) -> Result<(), StoreError> {
        if self.loaded.contains(entity) {
            return Ok(());
        }
        let _load = self.load.lock();
        if self.loaded.contains(entity) {
            return Ok(());
        }

        let records = self
            .durable
            .load_entity(entity)
            .map_err(|e| backend_error(&e))?;
        let now = now_millis();
        let revision = self.revision.load(Ordering::Acquire);
        let mut count = 0_usize;
        for record in records {
            let pending_removal = self
                .tombstones
                .contains(&(entity.to_string(), record.key.clone()));
            if pending_removal || self.engine.contains_key(entity, &record.key) {
                continue;
            }
            let key = record.key.clone();
            self.engine.put(
                entity,
                &key,
                StoredEntry {
                    record,
                    metadata: EntryMetadata::loaded(now, revision),
                },
            );
            count += 1;
        }
        self.loaded.insert(entity.to_string());
        debug!(entity, count, "loaded entity into main scope");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use recordkit_core::SortDescriptor;

    use super::*;
    use crate::storage::mutation_observer::tests::CountingObserver;
    use crate::test_support::{adapter_with, dummies, memory_adapter, MemoryDurableStore};

    fn durable_adapter() -> (Arc<MemoryDurableStore>, Arc<StoreAdapter>) {
        let durable = Arc::new(MemoryDurableStore::default());
        let adapter = adapter_with(Arc::clone(&durable) as Arc<dyn DurableStore>, Vec::new());
        (durable, adapter)
    }

    #[test]
    fn fetch_of_unknown_entity_is_empty() {
        let adapter = memory_adapter();
        assert!(adapter.fetch(&FetchQuery::all("nothing")).unwrap().is_empty());
    }

    #[test]
    fn thousand_records_insert_persist_fetch() {
        let adapter = memory_adapter();
        let input = dummies(1000);
        adapter.save(&input).unwrap();
        adapter.persist().unwrap();

        let fetched = adapter.fetch(&FetchQuery::all("dummy")).unwrap();
        assert_eq!(fetched.len(), 1000);
        let keys: HashSet<&str> = fetched.iter().map(|r| r.key.as_str()).collect();
        assert!(input.iter().all(|r| keys.contains(r.key.as_str())));
    }

    #[test]
    fn fetch_filters_sorts_and_windows() {
        let adapter = memory_adapter();
        adapter.save(&dummies(20)).unwrap();

        let query = FetchQuery {
            entity: "dummy".into(),
            predicate: Predicate::gte("rank", 5),
            sort: vec![SortDescriptor::desc("rank")],
            limit: Some(3),
            offset: 2,
        };
        let ranks: Vec<i64> = adapter
            .fetch(&query)
            .unwrap()
            .iter()
            .map(|r| r.require_i64("rank").unwrap())
            .collect();
        assert_eq!(ranks, vec![17, 16, 15]);
    }

    #[test]
    fn save_replaces_existing_key() {
        let adapter = memory_adapter();
        let first = Record::new("dummy", "a").with_field("title", "one");
        let second = Record::new("dummy", "a").with_field("title", "two");
        adapter.save(&[first]).unwrap();
        adapter.save(&[second.clone()]).unwrap();

        assert_eq!(adapter.fetch(&FetchQuery::all("dummy")).unwrap(), vec![second]);
    }

    #[test]
    fn delete_removes_from_scope() {
        let adapter = memory_adapter();
        let records = dummies(3);
        adapter.save(&records).unwrap();
        adapter.delete(&records[..2]).unwrap();

        let left = adapter.fetch(&FetchQuery::all("dummy")).unwrap();
        assert_eq!(left, vec![records[2].clone()]);
    }

    #[test]
    fn save_is_not_durable_until_persist() {
        let (durable, adapter) = durable_adapter();
        adapter.save(&dummies(2)).unwrap();
        assert!(durable.stored("dummy").is_empty());
        assert!(adapter.has_pending_changes());

        assert_eq!(adapter.persist().unwrap(), 2);
        assert_eq!(durable.stored("dummy").len(), 2);
        assert!(!adapter.has_pending_changes());
    }

    #[test]
    fn persist_of_clean_scope_is_noop() {
        let (durable, adapter) = durable_adapter();
        adapter.save(&dummies(2)).unwrap();
        adapter.persist().unwrap();
        assert_eq!(adapter.persist().unwrap(), 0);
        assert_eq!(durable.write_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn failed_persist_keeps_scope_dirty_and_retries() {
        let (durable, adapter) = durable_adapter();
        adapter.save(&dummies(3)).unwrap();
        durable.fail_next_writes(1);

        let err = adapter.persist().unwrap_err();
        assert!(matches!(err, StoreError::PersistFailure(ref msg) if msg.contains("disk full")));
        assert!(durable.stored("dummy").is_empty());

        assert_eq!(adapter.persist().unwrap(), 3);
        assert_eq!(durable.stored("dummy").len(), 3);
    }

    #[test]
    fn deletes_reach_durable_store_on_persist() {
        let (durable, adapter) = durable_adapter();
        let records = dummies(2);
        adapter.save(&records).unwrap();
        adapter.persist().unwrap();

        adapter.delete(&records[..1]).unwrap();
        assert_eq!(durable.stored("dummy").len(), 2);
        adapter.persist().unwrap();
        assert_eq!(durable.stored("dummy"), vec![records[1].clone()]);
    }

    #[test]
    fn entities_load_lazily_from_durable_store() {
        let (durable, adapter) = durable_adapter();
        durable.seed(dummies(4));

        assert_eq!(adapter.fetch(&FetchQuery::all("dummy")).unwrap().len(), 4);
        assert!(!adapter.has_pending_changes());
    }

    #[test]
    fn batch_delete_unsupported_for_in_memory_store() {
        let adapter = memory_adapter();
        let err = adapter.batch_delete("dummy", &Predicate::All).unwrap_err();
        assert_eq!(
            err,
            StoreError::UnsupportedForStoreKind {
                operation: Operation::BatchDelete,
                kind: StoreKind::InMemory,
            }
        );
    }

    #[test]
    fn batch_delete_then_fetch_is_empty() {
        let (durable, adapter) = durable_adapter();
        durable.seed(dummies(5));
        adapter.fetch(&FetchQuery::all("dummy")).unwrap();
        // An unflushed record matching the predicate goes as well.
        adapter.save(&dummies(7)[5..]).unwrap();

        let deleted = adapter.batch_delete("dummy", &Predicate::All).unwrap();
        assert_eq!(deleted, 5);
        assert!(adapter.fetch(&FetchQuery::all("dummy")).unwrap().is_empty());
        assert!(durable.stored("dummy").is_empty());
    }

    #[test]
    fn batch_delete_leaves_other_entities_alone() {
        let (durable, adapter) = durable_adapter();
        durable.seed(dummies(3));
        durable.seed([Record::new("other", "x")]);

        adapter.batch_delete("dummy", &Predicate::lt("rank", 2)).unwrap();
        let left = adapter.fetch(&FetchQuery::all("dummy")).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(adapter.fetch(&FetchQuery::all("other")).unwrap().len(), 1);
    }

    #[test]
    fn reset_store_clears_everything() {
        let (durable, adapter) = durable_adapter();
        durable.seed(dummies(3));
        adapter.save(&[Record::new("other", "x")]).unwrap();

        adapter.reset_store().unwrap();
        assert!(adapter.fetch(&FetchQuery::all("dummy")).unwrap().is_empty());
        assert!(adapter.fetch(&FetchQuery::all("other")).unwrap().is_empty());
        assert!(!adapter.has_pending_changes());
    }

    #[test]
    fn disconnected_adapter_is_unavailable() {
        let adapter = memory_adapter();
        adapter.disconnect();
        assert_eq!(adapter.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            adapter.fetch(&FetchQuery::all("dummy")).unwrap_err(),
            StoreError::Unavailable
        );
        assert_eq!(adapter.save(&dummies(1)).unwrap_err(), StoreError::Unavailable);
        assert_eq!(adapter.persist().unwrap_err(), StoreError::Unavailable);

        adapter.connect();
        assert!(adapter.fetch(&FetchQuery::all("dummy")).is_ok());
    }

    #[test]
    fn invalid_regex_is_backend_error() {
        let adapter = memory_adapter();
        let predicate = Predicate::Regex {
            attribute: "title".into(),
            pattern: "(".into(),
        };
        let query = FetchQuery {
            predicate,
            ..FetchQuery::all("dummy")
        };
        assert!(matches!(adapter.fetch(&query), Err(StoreError::Backend(_))));
    }

    #[test]
    fn observers_see_mutations_and_one_commit_per_scope() {
        let counter = Arc::new(CountingObserver::default());
        let adapter = adapter_with(
            Arc::new(MemoryDurableStore::default()),
            vec![Arc::clone(&counter) as Arc<dyn MutationObserver>],
        );
        let records = dummies(3);

        adapter.save(&records).unwrap();
        adapter.save(&records[..1]).unwrap();
        adapter.delete(&records[1..2]).unwrap();
        adapter.delete(&records[1..2]).unwrap();
        adapter.persist().unwrap();
        adapter.reset_store().unwrap();

        assert_eq!(counter.insert_count.load(AtomicOrdering::Relaxed), 3);
        assert_eq!(counter.update_count.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(counter.remove_count.load(AtomicOrdering::Relaxed), 1);
        // The second delete touched nothing, so it did not commit.
        assert_eq!(counter.commit_count.load(AtomicOrdering::Relaxed), 3);
        assert_eq!(counter.persist_count.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(counter.reset_count.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn replace_commits_once_and_keeps_key_durable() {
        let counter = Arc::new(CountingObserver::default());
        let durable = Arc::new(MemoryDurableStore::default());
        let adapter = adapter_with(
            Arc::clone(&durable) as Arc<dyn DurableStore>,
            vec![Arc::clone(&counter) as Arc<dyn MutationObserver>],
        );
        let original = Record::new("dummy", "a").with_field("title", "old");
        adapter.save(&[original.clone()]).unwrap();
        adapter.persist().unwrap();

        let updated = Record::new("dummy", "a")
            .with_version(2)
            .with_field("title", "new");
        adapter.replace(&[original], &[updated.clone()]).unwrap();
        adapter.persist().unwrap();

        assert_eq!(counter.commit_count.load(AtomicOrdering::Relaxed), 2);
        assert_eq!(durable.stored("dummy"), vec![updated]);
    }

    #[test]
    fn replace_of_same_key_is_never_seen_half_done() {
        use std::sync::atomic::AtomicBool;

        let adapter = memory_adapter();
        let record = Record::new("dummy", "a").with_field("title", "steady");
        adapter.save(&[record.clone()]).unwrap();

        let done = AtomicBool::new(false);
        let missing = std::thread::scope(|s| {
            s.spawn(|| {
                while !done.load(AtomicOrdering::Relaxed) {
                    adapter.replace(&[record.clone()], &[record.clone()]).unwrap();
                }
            });
            let missing = (0..20_000)
                .filter(|_| adapter.fetch(&FetchQuery::all("dummy")).unwrap().is_empty())
                .count();
            done.store(true, AtomicOrdering::Relaxed);
            missing
        });
        assert_eq!(missing, 0);
    }

    #[test]
    fn replace_rewrite_is_an_update_without_tombstone() {
        let counter = Arc::new(CountingObserver::default());
        let (durable, adapter) = {
            let durable = Arc::new(MemoryDurableStore::default());
            let adapter = adapter_with(
                Arc::clone(&durable) as Arc<dyn DurableStore>,
                vec![Arc::clone(&counter) as Arc<dyn MutationObserver>],
            );
            (durable, adapter)
        };
        let original = Record::new("dummy", "a");
        adapter.save(&[original.clone()]).unwrap();
        adapter
            .replace(&[original.clone()], &[original.clone().with_version(2)])
            .unwrap();

        assert_eq!(counter.remove_count.load(AtomicOrdering::Relaxed), 0);
        assert_eq!(counter.update_count.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(adapter.persist().unwrap(), 1);
        assert_eq!(durable.stored("dummy")[0].version, 2);
    }

    #[test]
    fn get_many_follows_key_order_and_skips_missing() {
        let (durable, adapter) = durable_adapter();
        durable.seed(dummies(5));

        let found = adapter
            .get_many("dummy", &["0003", "nope", "0001"])
            .unwrap();
        let keys: Vec<&str> = found.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["0003", "0001"]);
    }
}
