//! [`DurableStore`](super::DurableStore) implementations.
//!
//! [`NullDataStore`] backs the in-memory store kind; [`RedbDataStore`] is the
//! durable, file-backed kind.

mod null;
#[cfg(feature = "redb")]
mod redb;

pub use null::NullDataStore;
#[cfg(feature = "redb")]
pub use redb::{RedbDataStore, RedbStoreError};
