//! Response type of the request pipeline.

use recordkit_core::{Record, RequestResult};

/// Raw outcome of one executed request, before any result processing.
#[derive(Debug)]
pub enum Execution {
    /// Records returned by a fetch, in fetch order.
    Fetched(Vec<Record>),
    /// One outcome per payload item of a save, delete or upsert.
    Applied(Vec<RequestResult<Record>>),
    /// Persist, batch delete or reset finished; nothing to hand back.
    Completed,
}

impl Execution {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Execution::Fetched(_) => "fetched",
            Execution::Applied(_) => "applied",
            Execution::Completed => "completed",
        }
    }

    /// Number of records or items carried.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Execution::Fetched(records) => records.len(),
            Execution::Applied(items) => items.len(),
            Execution::Completed => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
