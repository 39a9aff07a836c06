//! User-registered request filters.
//!
//! Filters run in registration order before dispatch. Each one may hand back
//! a rewritten request or reject it; a rejection fails the request with
//! `RequestError::Filter` and the inner service is never called.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use recordkit_core::{Request, RequestError};
use tower::{Layer, Service};

use crate::service::operation::Execution;

/// Rewrites or rejects a request before it reaches the store.
#[async_trait]
pub trait RequestFilter: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returning an error rejects the request.
    async fn filter(&self, request: Request) -> anyhow::Result<Request>;
}

// ---------------------------------------------------------------------------
// FilterLayer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FilterLayer {
    filters: Arc<[Arc<dyn RequestFilter>]>,
}

impl FilterLayer {
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn RequestFilter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }
}

impl<S> Layer<S> for FilterLayer {
    type Service = FilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FilterService {
            inner,
            filters: Arc::clone(&self.filters),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FilterService<S> {
    inner: S,
    filters: Arc<[Arc<dyn RequestFilter>]>,
}

impl<S> Service<Request> for FilterService<S>
where
    S: Service<Request, Response = Execution, Error = RequestError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Execution;
    type Error = RequestError;
    type Future = Pin<Box<dyn Future<Output = Result<Execution, RequestError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        if !request.apply_middlewares() || self.filters.is_empty() {
            return Box::pin(self.inner.call(request));
        }

        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let filters = Arc::clone(&self.filters);

        Box::pin(async move {
            let mut request = request;
            for filter in filters.iter() {
                request = filter.filter(request).await.map_err(RequestError::Filter)?;
            }
            inner.call(request).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use recordkit_core::Operation;
    use tower::ServiceExt;

    use super::*;

    /// Echoes the request's fetch limit back as the number of fetched records.
    #[derive(Clone)]
    struct EchoService {
        calls: Arc<AtomicUsize>,
    }

    impl Service<Request> for EchoService {
        type Response = Execution;
        type Error = RequestError;
        type Future = Pin<Box<dyn Future<Output = Result<Execution, RequestError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: Request) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = request.fetch_limit().unwrap_or(0);
            Box::pin(async move {
                let records = (0..n)
                    .map(|i| recordkit_core::Record::new("dummy", i.to_string()))
                    .collect();
                Ok(Execution::Fetched(records))
            })
        }
    }

    struct CapLimit(usize);

    #[async_trait]
    impl RequestFilter for CapLimit {
        async fn filter(&self, request: Request) -> anyhow::Result<Request> {
            let limit = request.fetch_limit().unwrap_or(self.0).min(self.0);
            Ok(request.to_builder().fetch_limit(limit).build()?)
        }
    }

    struct RejectAll;

    #[async_trait]
    impl RequestFilter for RejectAll {
        async fn filter(&self, _request: Request) -> anyhow::Result<Request> {
            anyhow::bail!("read-only mode")
        }
    }

    fn fetch(limit: usize, apply_middlewares: bool) -> Request {
        Request::builder()
            .operation(Operation::Fetch)
            .entity("dummy")
            .fetch_limit(limit)
            .apply_middlewares(apply_middlewares)
            .build()
            .unwrap()
    }

    fn echo() -> (EchoService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            EchoService {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn filters_rewrite_in_order() {
        let (svc, _) = echo();
        let layer = FilterLayer::new(vec![Arc::new(CapLimit(10)), Arc::new(CapLimit(4))]);
        let resp = layer.layer(svc).oneshot(fetch(25, true)).await.unwrap();
        assert_eq!(resp.len(), 4);
    }

    #[tokio::test]
    async fn rejection_skips_inner_service() {
        let (svc, calls) = echo();
        let layer = FilterLayer::new(vec![Arc::new(RejectAll)]);
        let err = layer.layer(svc).oneshot(fetch(3, true)).await.unwrap_err();
        assert!(matches!(err, RequestError::Filter(_)));
        assert!(err.to_string().contains("read-only mode"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skipped_when_middlewares_disabled() {
        let (svc, calls) = echo();
        let layer = FilterLayer::new(vec![Arc::new(RejectAll)]);
        let resp = layer.layer(svc).oneshot(fetch(3, false)).await.unwrap();
        assert_eq!(resp.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
