//! Timeout middleware for requests.
//!
//! Fails an attempt that runs longer than the configured limit with
//! `RequestError::Timeout`. Sits inside the retry layer, so every attempt
//! gets the full budget.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use recordkit_core::{Request, RequestError};
use tower::{Layer, Service};

use crate::service::operation::Execution;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds each attempt. `None` disables the bound.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    timeout: Option<Duration>,
}

impl TimeoutLayer {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Builds the layer from a millisecond budget where 0 means unbounded.
    #[must_use]
    pub fn from_millis(timeout_ms: u64) -> Self {
        Self::new((timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)))
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces the per-attempt timeout.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    timeout: Option<Duration>,
}

impl<S> Service<Request> for TimeoutService<S>
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
        let timeout = self.timeout;
        let fut = self.inner.call(request);
        Box::pin(async move {
            let Some(duration) = timeout else {
                return fut.await;
            };
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(RequestError::Timeout {
                    timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
