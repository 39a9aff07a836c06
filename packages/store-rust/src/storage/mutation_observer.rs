//! Mutation observer trait and composite implementation.
//!
//! [`MutationObserver`] reacts to record mutations inside a
//! [`StoreAdapter`](super::StoreAdapter); [`CompositeMutationObserver`] fans
//! each notification out to several observers.

use std::sync::Arc;

use recordkit_core::Record;

/// Observer for record mutations within a `StoreAdapter`.
///
/// Calls happen while the adapter's main scope is held, so implementations
/// must be cheap and must not call back into the adapter.
///
/// Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called after a record is inserted under a previously unused key.
    fn on_insert(&self, record: &Record);

    /// Called after an existing record is replaced.
    fn on_update(&self, old: &Record, new: &Record);

    /// Called after a record is removed from the main scope.
    fn on_remove(&self, record: &Record);

    /// Called after a successful `persist()` that flushed `flushed` changes.
    fn on_persist(&self, flushed: usize);

    /// Called when a main-scope block that may have mutated data ends.
    fn on_scope_committed(&self);

    /// Called after the whole store has been reset.
    fn on_reset(&self);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn MutationObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_insert(&self, record: &Record) {
        for observer in &self.observers {
            observer.on_insert(record);
        }
    }

    fn on_update(&self, old: &Record, new: &Record) {
        for observer in &self.observers {
            observer.on_update(old, new);
        }
    }

    fn on_remove(&self, record: &Record) {
        for observer in &self.observers {
            observer.on_remove(record);
        }
    }

    fn on_persist(&self, flushed: usize) {
        for observer in &self.observers {
            observer.on_persist(flushed);
        }
    }

    fn on_scope_committed(&self) {
        for observer in &self.observers {
            observer.on_scope_committed();
        }
    }

    fn on_reset(&self) {
        for observer in &self.observers {
            observer.on_reset();
        }
    }
}
