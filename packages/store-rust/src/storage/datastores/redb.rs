//! [`DurableStore`] backed by an embedded redb database.
//!
//! All records live in one table. Keys are `entity \0 primary-key`, so one
//! entity is a contiguous key range. Values are `MsgPack`-encoded
//! [`Record`]s.

use std::path::Path;

use recordkit_core::{Predicate, Record, StoreKind};
use redb::{Database, ReadableTable, TableDefinition};

use crate::storage::durable_store::{DurableStore, PersistBatch};

const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Errors raised by [`RedbDataStore`].
#[derive(Debug, thiserror::Error)]
pub enum RedbStoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("record encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("record decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("invalid predicate: {0}")]
    Predicate(#[from] regex::Error),
}

fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(entity.len() + 1);
    prefix.extend_from_slice(entity.as_bytes());
    prefix.push(0);
    prefix
}

fn record_key(entity: &str, key: &str) -> Vec<u8> {
    let mut bytes = entity_prefix(entity);
    bytes.extend_from_slice(key.as_bytes());
    bytes
}

/// Durable store on a single redb file.
pub struct RedbDataStore {
    db: Database,
}

impl RedbDataStore {
    /// Opens (or creates) the database at `path` and makes sure the records
    /// table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or initialised.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RedbStoreError> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, RedbStoreError> {
        let prefix = entity_prefix(entity);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let mut records = Vec::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (k, v) = entry?;
            if !k.value().starts_with(&prefix) {
                break;
            }
            records.push(Record::decode(v.value())?);
        }
        Ok(records)
    }

    fn apply(&self, batch: &PersistBatch) -> Result<(), RedbStoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECORDS)?;
            for record in &batch.upserts {
                let key = record_key(&record.entity, &record.key);
                let value = record.encode()?;
                table.insert(key.as_slice(), value.as_slice())?;
            }
            for (entity, key) in &batch.removals {
                table.remove(record_key(entity, key).as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_matching(
        &self,
        entity: &str,
        predicate: &Predicate,
    ) -> Result<Vec<String>, RedbStoreError> {
        let matcher = predicate.matcher()?;
        let prefix = entity_prefix(entity);
        let write_txn = self.db.begin_write()?;
        let mut deleted = Vec::new();
        {
            let mut table = write_txn.open_table(RECORDS)?;
            let mut doomed = Vec::new();
            for entry in table.range(prefix.as_slice()..)? {
                let (k, v) = entry?;
                if !k.value().starts_with(&prefix) {
                    break;
                }
                let record = Record::decode(v.value())?;
                if matcher.matches(&record) {
                    doomed.push(k.value().to_vec());
                    deleted.push(record.key);
                }
            }
            for key in doomed {
                table.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(deleted)
    }

    fn recreate(&self) -> Result<(), RedbStoreError> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(RECORDS)?;
        {
            let _ = write_txn.open_table(RECORDS)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl DurableStore for RedbDataStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Durable
    }

    fn load_entity(&self, entity: &str) -> anyhow::Result<Vec<Record>> {
        Ok(self.scan(entity)?)
    }

    fn write_batch(&self, batch: &PersistBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        Ok(self.apply(batch)?)
    }

    fn delete_matching(&self, entity: &str, predicate: &Predicate) -> anyhow::Result<Vec<String>> {
        Ok(self.remove_matching(entity, predicate)?)
    }

    fn reset(&self) -> anyhow::Result<()> {
        Ok(self.recreate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbDataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbDataStore::open(dir.path().join("records.redb")).unwrap();
        (dir, store)
    }

    fn user(key: &str, age: i64) -> Record {
        Record::new("user", key).with_field("age", age)
    }

    #[test]
    fn write_batch_then_load_entity() {
        let (_dir, store) = open_temp();
        let batch = PersistBatch {
            upserts: vec![user("u1", 20), user("u2", 30), Record::new("order", "o1")],
            removals: Vec::new(),
        };
        store.write_batch(&batch).unwrap();

        let mut users = store.load_entity("user").unwrap();
        users.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(users, vec![user("u1", 20), user("u2", 30)]);
        assert_eq!(store.load_entity("order").unwrap().len(), 1);
    }

    #[test]
    fn entity_prefix_does_not_leak_into_longer_names() {
        let (_dir, store) = open_temp();
        store
            .write_batch(&PersistBatch {
                upserts: vec![Record::new("user", "a"), Record::new("users", "b")],
                removals: Vec::new(),
            })
            .unwrap();
        let users = store.load_entity("user").unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].key, "a");
    }

    #[test]
    fn removals_delete_records() {
        let (_dir, store) = open_temp();
        store
            .write_batch(&PersistBatch {
                upserts: vec![user("u1", 20), user("u2", 30)],
                removals: Vec::new(),
            })
            .unwrap();
        store
            .write_batch(&PersistBatch {
                upserts: Vec::new(),
                removals: vec![("user".into(), "u1".into())],
            })
            .unwrap();
        let users = store.load_entity("user").unwrap();
        assert_eq!(users, vec![user("u2", 30)]);
    }

    #[test]
    fn delete_matching_only_touches_matching_records() {
        let (_dir, store) = open_temp();
        store
            .write_batch(&PersistBatch {
                upserts: vec![user("u1", 20), user("u2", 30), user("u3", 40)],
                removals: Vec::new(),
            })
            .unwrap();

        let mut deleted = store
            .delete_matching("user", &Predicate::gte("age", 30))
            .unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["u2", "u3"]);
        assert_eq!(store.load_entity("user").unwrap(), vec![user("u1", 20)]);
    }

    #[test]
    fn reset_drops_everything() {
        let (_dir, store) = open_temp();
        store
            .write_batch(&PersistBatch {
                upserts: vec![user("u1", 20)],
                removals: Vec::new(),
            })
            .unwrap();
        store.reset().unwrap();
        assert!(store.load_entity("user").unwrap().is_empty());
        assert_eq!(store.kind(), StoreKind::Durable);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.redb");
        {
            let store = RedbDataStore::open(&path).unwrap();
            store
                .write_batch(&PersistBatch {
                    upserts: vec![user("u1", 20)],
                    removals: Vec::new(),
                })
                .unwrap();
        }
        let reopened = RedbDataStore::open(&path).unwrap();
        assert_eq!(reopened.load_entity("user").unwrap(), vec![user("u1", 20)]);
    }
}
