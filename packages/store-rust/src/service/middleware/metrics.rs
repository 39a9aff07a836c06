//! Metrics and logging middleware for requests.
//!
//! Opens one `tracing` span per request, records duration and outcome on it,
//! and feeds the `recordkit_requests_total` counter and the
//! `recordkit_request_duration_ms` histogram. Requests built with
//! `apply_middlewares = false` pass straight through.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use recordkit_core::{Request, RequestError};
use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::service::operation::Execution;

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments requests with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Execution, Error = RequestError> + Send,
    S::Future: Send + 'static,
{
    type Response = Execution;
    type Error = RequestError;
    type Future = Pin<Box<dyn Future<Output = Result<Execution, RequestError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        if !request.apply_middlewares() {
            return Box::pin(self.inner.call(request));
        }

        let operation = request.operation().as_str();
        let label = request.description();
        let call_id = Uuid::new_v4();

        let span = info_span!(
            "request",
            operation,
            label = %label,
            call_id = %call_id,
            retries = request.retries(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = start.elapsed().as_millis();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.root().kind(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_u64 = duration_ms as u64;
                tracing::Span::current().record("duration_ms", duration_u64);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(
                    "recordkit_requests_total",
                    "operation" => operation,
                    "outcome" => outcome
                )
                .increment(1);
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!("recordkit_request_duration_ms", "operation" => operation)
                    .record(duration_u64 as f64);

                match &result {
                    Ok(execution) => tracing::info!(
                        duration_ms = duration_u64,
                        items = execution.len(),
                        "request complete"
                    ),
                    Err(err) => tracing::warn!(
                        duration_ms = duration_u64,
                        error = %err,
                        "request failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
