//! Request processor: runs one processing stage.
//!
//! A stage takes the previous stage's result, builds a request with a
//! [`RequestGenerator`], pushes it through the middleware pipeline into the
//! store gateway, and converts the returned records with a
//! [`ResultProcessor`]. A failed previous result short-circuits the stage
//! before the generator runs.

use std::sync::Arc;

use futures_util::stream::{self, Stream};
use recordkit_core::{
    BatchResult, Record, Request, RequestError, RequestOverride, RequestResult, StoreKind,
};
use tower::ServiceExt;

use super::config::ProcessorConfig;
use super::dispatcher::StoreDispatcher;
use super::gateway::StoreGateway;
use super::generator::RequestGenerator;
use super::middleware::{build_request_pipeline, RequestFilter};
use super::operation::Execution;
use super::result_processor::ResultProcessor;

/// Executes requests against a [`StoreGateway`].
///
/// Cheap to clone; clones share the gateway and the filter list.
#[derive(Clone)]
pub struct RequestProcessor {
    gateway: Arc<dyn StoreGateway>,
    filters: Vec<Arc<dyn RequestFilter>>,
    config: ProcessorConfig,
}

impl RequestProcessor {
    #[must_use]
    pub fn new(gateway: Arc<dyn StoreGateway>, config: ProcessorConfig) -> Self {
        Self {
            gateway,
            filters: Vec::new(),
            config,
        }
    }

    /// Appends a request filter. Filters run in registration order.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn StoreGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn store_kind(&self) -> StoreKind {
        self.gateway.kind()
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Sends one request through the middleware pipeline.
    ///
    /// Requests asking for fewer attempts than `default_retries` are raised
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's stage-level error.
    pub async fn execute(&self, request: Request) -> Result<Execution, RequestError> {
        let request = if request.retries() < self.config.default_retries {
            request.with_override(RequestOverride::Retries(self.config.default_retries))?
        } else {
            request
        };
        let pipeline = build_request_pipeline(
            StoreDispatcher::new(Arc::clone(&self.gateway)),
            self.filters.clone(),
            &self.config,
        );
        pipeline.oneshot(request).await
    }

    /// Runs one stage and returns its result directly.
    pub async fn process_single<P, G, R>(
        &self,
        previous: RequestResult<P>,
        generator: G,
        processor: R,
    ) -> BatchResult<R::Output>
    where
        P: Send,
        G: RequestGenerator<P>,
        R: ResultProcessor,
    {
        let request = generator
            .generate(previous?)
            .map_err(RequestError::Generator)?;
        let execution = self.execute(request).await?;
        Ok(convert(execution, &processor))
    }

    /// Runs one stage as a single-item stream. The stream owns everything it
    /// needs and is independent of `self`.
    pub fn process<P, G, R>(
        &self,
        previous: RequestResult<P>,
        generator: G,
        processor: R,
    ) -> impl Stream<Item = BatchResult<R::Output>> + Send + 'static
    where
        P: Send + 'static,
        G: RequestGenerator<P> + 'static,
        R: ResultProcessor,
    {
        let this = self.clone();
        stream::once(async move { this.process_single(previous, generator, processor).await })
    }

    /// Runs one stage whose operation yields no records.
    pub async fn process_void_single<P, G>(
        &self,
        previous: RequestResult<P>,
        generator: G,
    ) -> RequestResult<()>
    where
        P: Send,
        G: RequestGenerator<P>,
    {
        let request = generator
            .generate(previous?)
            .map_err(RequestError::Generator)?;
        self.execute(request).await.map(|_| ())
    }

    /// Stream form of [`process_void_single`](Self::process_void_single).
    pub fn process_void<P, G>(
        &self,
        previous: RequestResult<P>,
        generator: G,
    ) -> impl Stream<Item = RequestResult<()>> + Send + 'static
    where
        P: Send + 'static,
        G: RequestGenerator<P> + 'static,
    {
        let this = self.clone();
        stream::once(async move { this.process_void_single(previous, generator).await })
    }
}

fn convert<R: ResultProcessor>(execution: Execution, processor: &R) -> Vec<RequestResult<R::Output>> {
    let apply = |record: Record| processor.process(record).map_err(RequestError::Processor);
    match execution {
        Execution::Fetched(records) => records.into_iter().map(apply).collect(),
        Execution::Applied(items) => items
            .into_iter()
            .map(|item| item.and_then(apply))
            .collect(),
        Execution::Completed => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
