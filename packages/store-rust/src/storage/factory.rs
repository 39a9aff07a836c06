//! Factory for fully-wired [`StoreAdapter`] instances.
//!
//! [`StoreFactory`] is the dependency injection point: it picks the durable
//! backend from a [`StoreConfig`], pairs it with a fresh [`HashMapStorage`]
//! engine, and assembles a [`CompositeMutationObserver`] from the registered
//! observers.

use std::sync::Arc;

use anyhow::Context as _;
use recordkit_core::StoreKind;

use crate::service::config::StoreConfig;
use crate::storage::adapter::StoreAdapter;
use crate::storage::datastores::NullDataStore;
use crate::storage::durable_store::DurableStore;
use crate::storage::engines::HashMapStorage;
use crate::storage::mutation_observer::{CompositeMutationObserver, MutationObserver};

pub struct StoreFactory {
    config: StoreConfig,
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl StoreFactory {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// Registers an observer for every adapter this factory creates.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Opens the configured backend and builds the adapter around it.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable kind has no path, the backend cannot
    /// be opened, or the crate was built without the `redb` feature.
    pub fn create(&self) -> anyhow::Result<StoreAdapter> {
        let durable = self.open_durable()?;
        let observer = Arc::new(CompositeMutationObserver::new(self.observers.clone()));
        tracing::info!(kind = %durable.kind(), "store adapter created");
        Ok(StoreAdapter::new(
            Arc::new(HashMapStorage::new()),
            durable,
            observer,
        ))
    }

    fn open_durable(&self) -> anyhow::Result<Arc<dyn DurableStore>> {
        match self.config.kind {
            StoreKind::InMemory => Ok(Arc::new(NullDataStore)),
            StoreKind::Durable => {
                let path = self
                    .config
                    .path
                    .as_ref()
                    .context("durable store requires a database path")?;
                open_redb(path)
            }
        }
    }
}

#[cfg(feature = "redb")]
fn open_redb(path: &std::path::Path) -> anyhow::Result<Arc<dyn DurableStore>> {
    let store = crate::storage::datastores::RedbDataStore::open(path)
        .with_context(|| format!("failed to open redb database at {}", path.display()))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redb"))]
fn open_redb(path: &std::path::Path) -> anyhow::Result<Arc<dyn DurableStore>> {
    anyhow::bail!(
        "cannot open {}: built without the `redb` feature",
        path.display()
    )
}
