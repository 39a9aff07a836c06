//! Upsert planning: fetch + delete + insert, with per-item conflict resolution.
//!
//! [`plan_upsert`] is pure. Given the stored originals and the edited
//! payload it decides which originals become stale, which records are
//! written, and what each payload item resolves to. Running the plan is the
//! gateway's job.

use std::collections::{HashMap, HashSet};

use recordkit_core::{
    resolve, Record, RequestResult, VersionConflictStrategy, VersionUpdateRequest,
};

/// Writes and per-item outcomes of one upsert batch.
#[derive(Debug, Default)]
pub struct UpsertPlan {
    /// Stored originals superseded by an applied edit, deleted first.
    pub stale: Vec<Record>,
    /// Records to insert after the deletes, one per distinct key.
    pub writes: Vec<Record>,
    /// One outcome per payload item, in payload order.
    pub outcomes: Vec<RequestResult<Record>>,
}

/// Resolves every payload item against its original.
///
/// Originals are indexed by primary key. A key repeated in the payload
/// resolves against the outcome of its previous occurrence, and only the
/// last write per key is kept.
#[must_use]
pub fn plan_upsert(
    originals: Vec<Record>,
    payload: Vec<Record>,
    strategy: VersionConflictStrategy,
) -> UpsertPlan {
    let stored: HashSet<String> = originals.iter().map(|r| r.key.clone()).collect();
    let mut current: HashMap<String, Record> =
        originals.into_iter().map(|r| (r.key.clone(), r)).collect();
    let mut stale_keys = HashSet::new();
    let mut write_slots: HashMap<String, usize> = HashMap::new();
    let mut plan = UpsertPlan::default();

    for edited in payload {
        let original = current.get(&edited.key).cloned();
        let resolution = match resolve(VersionUpdateRequest {
            edited,
            original,
            strategy,
        }) {
            Ok(resolution) => resolution,
            Err(err) => {
                plan.outcomes.push(Err(err));
                continue;
            }
        };

        if !resolution.is_write() {
            plan.outcomes.push(Ok(resolution.into_record()));
            continue;
        }

        let record = resolution.into_record();
        let key = record.key.clone();
        if stored.contains(&key) && stale_keys.insert(key.clone()) {
            if let Some(original) = current.get(&key) {
                plan.stale.push(original.clone());
            }
        }
        match write_slots.get(&key) {
            Some(&slot) => plan.writes[slot] = record.clone(),
            None => {
                write_slots.insert(key.clone(), plan.writes.len());
                plan.writes.push(record.clone());
            }
        }
        current.insert(key, record.clone());
        plan.outcomes.push(Ok(record));
    }

    plan
}
