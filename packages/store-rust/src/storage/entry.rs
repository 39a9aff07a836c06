//! Entry types for the storage layer.
//!
//! Defines [`StoredEntry`], the unit kept by a
//! [`StorageEngine`](super::StorageEngine): a [`Record`] plus the
//! [`EntryMetadata`] the adapter uses to decide what still has to be persisted.

use std::time::{SystemTime, UNIX_EPOCH};

use recordkit_core::Record;

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Bookkeeping tracked for every entry in the in-memory scope.
///
/// Dirtiness is decided by revisions, not timestamps: two writes inside the
/// same millisecond must still be told apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Wall-clock time (millis since epoch) when the entry entered the scope.
    pub creation_time: i64,
    /// Wall-clock time of the last write.
    pub last_update_time: i64,
    /// Wall-clock time of the last successful flush. 0 = never stored.
    pub last_stored_time: i64,
    /// Scope-wide revision of the last write.
    pub revision: u64,
    /// Revision that was last flushed to the durable store.
    pub stored_revision: u64,
}

impl EntryMetadata {
    /// Metadata for an entry written by the caller and not yet persisted.
    #[must_use]
    pub fn new(now: i64, revision: u64) -> Self {
        Self {
            creation_time: now,
            last_update_time: now,
            last_stored_time: 0,
            revision,
            stored_revision: 0,
        }
    }

    /// Metadata for an entry loaded from the durable store, already clean.
    #[must_use]
    pub fn loaded(now: i64, revision: u64) -> Self {
        Self {
            creation_time: now,
            last_update_time: now,
            last_stored_time: now,
            revision,
            stored_revision: revision,
        }
    }

    /// Records a write at `revision`.
    pub fn on_update(&mut self, now: i64, revision: u64) {
        self.last_update_time = now;
        self.revision = revision;
    }

    /// Records a successful flush of the current revision.
    pub fn on_store(&mut self, now: i64) {
        self.last_stored_time = now;
        self.stored_revision = self.revision;
    }

    /// Returns `true` if the entry changed since it was last flushed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.revision > self.stored_revision
    }
}

/// A record together with its scope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub record: Record,
    pub metadata: EntryMetadata,
}
