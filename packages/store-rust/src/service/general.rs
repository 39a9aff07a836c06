//! Typed convenience stages over [`PureObject`] types.
//!
//! Each stage takes the previous stage's result and short-circuits on a
//! failure, so stages chain with plain `.await`:
//!
//! ```ignore
//! let saved = processor.save_to_memory(Ok(profiles)).await;
//! let persisted = processor.persist_to_store(saved).await;
//! ```

use recordkit_core::{
    BatchResult, Operation, Predicate, PureObject, Request, RequestResult, SortDescriptor,
    VersionConflictStrategy,
};

use super::processor::RequestProcessor;
use super::result_processor::typed;

fn records_of<T: PureObject>(objects: &[T]) -> Vec<recordkit_core::Record> {
    objects.iter().map(PureObject::to_record).collect()
}

fn mutation<T: PureObject>(operation: Operation, objects: &[T]) -> anyhow::Result<Request> {
    Ok(Request::builder()
        .operation(operation)
        .entity(T::ENTITY)
        .payload(records_of(objects))
        .build()?)
}

impl RequestProcessor {
    /// Fetches every `T` matching `predicate`, ordered by `sort` (primary key
    /// when empty).
    pub async fn fetch_all<T, P>(
        &self,
        previous: RequestResult<P>,
        predicate: Option<Predicate>,
        sort: Vec<SortDescriptor>,
    ) -> BatchResult<T>
    where
        T: PureObject,
        P: Send,
    {
        let generator = move |_previous: P| -> anyhow::Result<Request> {
            let mut builder = Request::builder()
                .operation(Operation::Fetch)
                .entity(T::ENTITY)
                .sort(sort);
            if let Some(predicate) = predicate {
                builder = builder.predicate(predicate);
            }
            Ok(builder.build()?)
        };
        self.process_single(previous, generator, typed::<T>()).await
    }

    /// Saves the previous stage's objects into the in-memory scope.
    pub async fn save_to_memory<T: PureObject>(
        &self,
        previous: RequestResult<Vec<T>>,
    ) -> BatchResult<T> {
        let generator = |objects: Vec<T>| mutation(Operation::Save, &objects);
        self.process_single(previous, generator, typed::<T>()).await
    }

    /// Upserts the previous stage's objects under `strategy`.
    pub async fn upsert_in_memory<T: PureObject>(
        &self,
        previous: RequestResult<Vec<T>>,
        strategy: VersionConflictStrategy,
    ) -> BatchResult<T> {
        let generator = move |objects: Vec<T>| -> anyhow::Result<Request> {
            Ok(mutation(Operation::Upsert, &objects)?
                .to_builder()
                .strategy(strategy)
                .build()?)
        };
        self.process_single(previous, generator, typed::<T>()).await
    }

    /// Deletes the previous stage's objects from the in-memory scope.
    pub async fn delete_in_memory<T: PureObject>(
        &self,
        previous: RequestResult<Vec<T>>,
    ) -> BatchResult<T> {
        let generator = |objects: Vec<T>| mutation(Operation::Delete, &objects);
        self.process_single(previous, generator, typed::<T>()).await
    }

    /// Flushes the in-memory scope to durable storage.
    pub async fn persist_to_store<P: Send>(&self, previous: RequestResult<P>) -> RequestResult<()> {
        let generator = |_previous: P| -> anyhow::Result<Request> {
            Ok(Request::builder().operation(Operation::Persist).build()?)
        };
        self.process_void_single(previous, generator).await
    }

    /// Deletes every durable `T` matching `predicate` (all of them when
    /// `None`).
    pub async fn batch_delete<T, P>(
        &self,
        previous: RequestResult<P>,
        predicate: Option<Predicate>,
    ) -> RequestResult<()>
    where
        T: PureObject,
        P: Send,
    {
        let generator = move |_previous: P| -> anyhow::Result<Request> {
            Ok(Request::builder()
                .operation(Operation::BatchDelete)
                .entity(T::ENTITY)
                .predicate(predicate.unwrap_or_default())
                .build()?)
        };
        self.process_void_single(previous, generator).await
    }

    /// Drops and recreates the whole store.
    pub async fn reset_stack<P: Send>(&self, previous: RequestResult<P>) -> RequestResult<()> {
        let generator = |_previous: P| -> anyhow::Result<Request> {
            Ok(Request::builder().operation(Operation::ResetStore).build()?)
        };
        self.process_void_single(previous, generator).await
    }
}
