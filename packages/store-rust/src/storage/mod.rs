//! Layered storage for the `recordkit` store.
//!
//! - **Engine** ([`StorageEngine`]): the in-memory scope, keyed by entity
//!   and primary key
//! - **Adapter** ([`StoreAdapter`]): the blocking facade that loads
//!   entities lazily, tracks dirty entries and flushes them on `persist()`
//! - **Durable backend** ([`DurableStore`]): none ([`NullDataStore`]) or
//!   redb ([`RedbDataStore`](datastores::RedbDataStore))
//!
//! [`MutationObserver`] and [`CompositeMutationObserver`] react to
//! mutations inside the adapter's main scope.

pub mod adapter;
pub mod datastores;
pub mod durable_store;
pub mod engine;
pub mod engines;
pub mod entry;
pub mod factory;
pub mod mutation_observer;

pub use adapter::{ConnectionState, StoreAdapter};
pub use datastores::NullDataStore;
pub use durable_store::{DurableStore, PersistBatch};
pub use engine::StorageEngine;
pub use entry::{EntryMetadata, StoredEntry};
pub use factory::StoreFactory;
pub use mutation_observer::{CompositeMutationObserver, MutationObserver};
