//! Pipeline composition: combines all middleware layers into a single service stack.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use recordkit_core::{Request, RequestError};
use tower::ServiceBuilder;

use super::filter::{FilterLayer, RequestFilter};
use super::metrics::MetricsLayer;
use super::retry::RetryLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ProcessorConfig;
use crate::service::dispatcher::StoreDispatcher;
use crate::service::operation::Execution;

/// Build the request pipeline by wrapping the `StoreDispatcher` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- one span, one duration and one outcome per request
/// 2. `FilterLayer` -- user filters rewrite or reject before any attempt
/// 3. `RetryLayer` -- re-issues the request up to `retries()` times
/// 4. `TimeoutLayer` -- bounds each attempt separately
#[must_use]
pub fn build_request_pipeline(
    dispatcher: StoreDispatcher,
    filters: Vec<Arc<dyn RequestFilter>>,
    config: &ProcessorConfig,
) -> impl tower::Service<
    Request,
    Response = Execution,
    Error = RequestError,
    Future = Pin<Box<dyn Future<Output = Result<Execution, RequestError>> + Send>>,
> + Clone
       + Send
       + 'static {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(FilterLayer::new(filters))
        .layer(RetryLayer)
        .layer(TimeoutLayer::from_millis(config.request_timeout_ms))
        .service(dispatcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
