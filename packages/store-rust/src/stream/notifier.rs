//! Change notices: turns committed mutations into per-entity broadcasts.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use recordkit_core::Record;
use tokio::sync::broadcast;

use crate::storage::MutationObserver;

/// What a committed main scope did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreNotice {
    /// At least one record of `entity` was inserted, updated or removed.
    Changed { entity: String },
    /// The whole store was dropped and recreated.
    Reset,
}

/// [`MutationObserver`] that collects the entities touched inside a main
/// scope and broadcasts one [`StoreNotice::Changed`] per entity when the
/// scope commits.
pub struct ChangeNotifier {
    touched: Mutex<BTreeSet<String>>,
    sender: broadcast::Sender<StoreNotice>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            touched: Mutex::new(BTreeSet::new()),
            sender,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotice> {
        self.sender.subscribe()
    }

    fn touch(&self, record: &Record) {
        self.touched.lock().insert(record.entity.clone());
    }

    fn publish(&self, notice: StoreNotice) {
        // No subscribers is not an error.
        let _ = self.sender.send(notice);
    }
}

impl MutationObserver for ChangeNotifier {
    fn on_insert(&self, record: &Record) {
        self.touch(record);
    }

    fn on_update(&self, _old: &Record, new: &Record) {
        self.touch(new);
    }

    fn on_remove(&self, record: &Record) {
        self.touch(record);
    }

    fn on_persist(&self, _flushed: usize) {}

    fn on_scope_committed(&self) {
        let touched = std::mem::take(&mut *self.touched.lock());
        for entity in touched {
            self.publish(StoreNotice::Changed { entity });
        }
    }

    fn on_reset(&self) {
        self.touched.lock().clear();
        self.publish(StoreNotice::Reset);
    }
}
