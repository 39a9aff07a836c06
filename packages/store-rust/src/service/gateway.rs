//! Async boundary in front of the blocking [`StoreAdapter`].
//!
//! [`StoreGateway`] is what the request pipeline and the change streams talk
//! to. [`StoreContext`] is the production implementation: reads run on the
//! blocking pool against a read-only view, every mutation is marshalled onto
//! one serial mutation queue.

use std::sync::Arc;

use async_trait::async_trait;
use recordkit_core::{
    FetchQuery, Predicate, Record, RequestResult, StoreError, StoreKind, VersionConflictStrategy,
};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::config::StoreConfig;
use super::upsert::plan_upsert;
use super::worker::{BackgroundRunnable, BackgroundWorker};
use crate::storage::StoreAdapter;

// ---------------------------------------------------------------------------
// StoreGateway trait
// ---------------------------------------------------------------------------

/// Async store operations used by the request pipeline.
///
/// Used as `Arc<dyn StoreGateway>`.
#[async_trait]
pub trait StoreGateway: Send + Sync + 'static {
    /// Kind of the backend behind the gateway.
    fn kind(&self) -> StoreKind;

    async fn fetch(&self, query: FetchQuery) -> Result<Vec<Record>, StoreError>;

    async fn save(&self, records: Vec<Record>) -> Result<(), StoreError>;

    async fn delete(&self, records: Vec<Record>) -> Result<(), StoreError>;

    /// Returns the number of flushed changes.
    async fn persist(&self) -> Result<usize, StoreError>;

    /// Returns the number of deleted durable records.
    async fn batch_delete(&self, entity: String, predicate: Predicate) -> Result<usize, StoreError>;

    async fn reset_store(&self) -> Result<(), StoreError>;

    /// Fetches the originals of `payload` by primary key, resolves each item
    /// with `strategy`, deletes the superseded originals and inserts the
    /// resolved records. One outcome per payload item, in order.
    ///
    /// The default composes the primitives above and is not atomic against
    /// concurrent writers; [`StoreContext`] overrides it with a single
    /// queued step.
    async fn upsert(
        &self,
        entity: String,
        payload: Vec<Record>,
        strategy: VersionConflictStrategy,
    ) -> Result<Vec<RequestResult<Record>>, StoreError> {
        let originals = self.fetch(originals_query(entity, &payload)).await?;
        let plan = plan_upsert(originals, payload, strategy);
        if !plan.stale.is_empty() {
            self.delete(plan.stale).await?;
        }
        if !plan.writes.is_empty() {
            self.save(plan.writes).await?;
        }
        Ok(plan.outcomes)
    }
}

fn originals_query(entity: String, payload: &[Record]) -> FetchQuery {
    FetchQuery {
        predicate: Predicate::key_in(payload.iter().map(|r| r.key.clone())),
        ..FetchQuery::all(entity)
    }
}

// ---------------------------------------------------------------------------
// Mutation queue
// ---------------------------------------------------------------------------

/// One unit of work for the mutation queue.
pub type MutationJob = Box<dyn FnOnce(&StoreAdapter) + Send>;

/// Runs mutation jobs serially on the blocking pool and flushes the scope
/// on ticks when auto-persist is on.
pub struct MutationRunnable {
    adapter: Arc<StoreAdapter>,
    persist_on_shutdown: bool,
}

impl MutationRunnable {
    async fn blocking<F>(&self, f: F)
    where
        F: FnOnce(&StoreAdapter) + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        if let Err(e) = tokio::task::spawn_blocking(move || f(&adapter)).await {
            error!(error = %e, "mutation job panicked");
        }
    }

    async fn flush(&self) {
        self.blocking(|adapter| {
            if !adapter.has_pending_changes() {
                return;
            }
            if let Err(e) = adapter.persist() {
                warn!(error = %e, "auto-persist failed");
            }
        })
        .await;
    }
}

#[async_trait]
impl BackgroundRunnable for MutationRunnable {
    type Task = MutationJob;

    async fn run(&mut self, job: MutationJob) {
        self.blocking(job).await;
    }

    async fn on_tick(&mut self) {
        self.flush().await;
    }

    async fn shutdown(&mut self) {
        if self.persist_on_shutdown {
            self.flush().await;
        }
    }
}

// ---------------------------------------------------------------------------
// StoreContext
// ---------------------------------------------------------------------------

/// The production [`StoreGateway`]: one adapter plus its mutation queue.
///
/// Must be created inside a tokio runtime.
pub struct StoreContext {
    adapter: Arc<StoreAdapter>,
    queue: BackgroundWorker<MutationRunnable>,
}

impl StoreContext {
    #[must_use]
    pub fn new(adapter: Arc<StoreAdapter>, config: &StoreConfig) -> Self {
        let tick = config.auto_persist_interval();
        let runnable = MutationRunnable {
            adapter: Arc::clone(&adapter),
            persist_on_shutdown: tick.is_some(),
        };
        let queue = BackgroundWorker::start(runnable, tick, config.mutation_queue_capacity);
        Self { adapter, queue }
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<StoreAdapter> {
        &self.adapter
    }

    /// Stops the mutation queue after the job in progress. With auto-persist
    /// on, the scope is flushed one last time.
    pub async fn shutdown(mut self) {
        self.queue.stop().await;
    }

    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreAdapter) -> Result<T, StoreError> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || f(&adapter))
            .await
            .map_err(|e| StoreError::Backend(format!("read task failed: {e}")))?
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreAdapter) -> Result<T, StoreError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.queue
            .submit(Box::new(move |adapter: &StoreAdapter| {
                // The caller timed out or was dropped while the job waited.
                if tx.is_closed() {
                    debug!("skipping abandoned mutation job");
                    return;
                }
                let _ = tx.send(f(adapter));
            }))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        rx.await.map_err(|_| StoreError::Unavailable)?
    }
}

#[async_trait]
impl StoreGateway for StoreContext {
    fn kind(&self) -> StoreKind {
        self.adapter.kind()
    }

    async fn fetch(&self, query: FetchQuery) -> Result<Vec<Record>, StoreError> {
        self.read(move |adapter| adapter.fetch(&query)).await
    }

    async fn save(&self, records: Vec<Record>) -> Result<(), StoreError> {
        self.mutate(move |adapter| adapter.save(&records)).await
    }

    async fn delete(&self, records: Vec<Record>) -> Result<(), StoreError> {
        self.mutate(move |adapter| adapter.delete(&records)).await
    }

    async fn persist(&self) -> Result<usize, StoreError> {
        self.mutate(StoreAdapter::persist).await
    }

    async fn batch_delete(&self, entity: String, predicate: Predicate) -> Result<usize, StoreError> {
        self.mutate(move |adapter| adapter.batch_delete(&entity, &predicate))
            .await
    }

    async fn reset_store(&self) -> Result<(), StoreError> {
        self.mutate(StoreAdapter::reset_store).await
    }

    async fn upsert(
        &self,
        entity: String,
        payload: Vec<Record>,
        strategy: VersionConflictStrategy,
    ) -> Result<Vec<RequestResult<Record>>, StoreError> {
        self.mutate(move |adapter| {
            let keys: Vec<&str> = payload.iter().map(|r| r.key.as_str()).collect();
            let originals = adapter.get_many(&entity, &keys)?;
            let plan = plan_upsert(originals, payload, strategy);
            adapter.replace(&plan.stale, &plan.writes)?;
            Ok(plan.outcomes)
        })
        .await
    }
}
