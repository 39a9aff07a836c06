//! Immediate retry of failed requests.
//!
//! A request is attempted `retries()` times with no delay in between. When
//! every attempt fails, a single-attempt request fails with its own error and
//! a multi-attempt request fails with `RequestError::RetriesExhausted`
//! wrapping the last one.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use recordkit_core::{Request, RequestError};
use tower::{Layer, Service, ServiceExt};

use crate::service::operation::Execution;

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryLayer;

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
}

impl<S> Service<Request> for RetryService<S>
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
        let attempts = request.retries();
        if attempts <= 1 {
            return Box::pin(self.inner.call(request));
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let operation = request.operation().as_str();
            let mut attempt = 1;
            let mut last = match inner.call(request.clone()).await {
                Ok(execution) => return Ok(execution),
                Err(err) => err,
            };
            while attempt < attempts {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    attempts,
                    error = %last,
                    "retrying request"
                );
                metrics::counter!("recordkit_retries_total", "operation" => operation).increment(1);
                match inner.ready().await?.call(request.clone()).await {
                    Ok(execution) => return Ok(execution),
                    Err(err) => last = err,
                }
            }
            Err(RequestError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            })
        })
    }
}
