//! Innermost service of the request pipeline: dispatches a `Request` to the
//! store gateway by its operation kind.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use recordkit_core::{Operation, Predicate, Request, RequestError, ValidationError};
use tower::Service;

use super::gateway::StoreGateway;
use super::operation::Execution;

/// Routes each [`Request`] to the matching [`StoreGateway`] call.
#[derive(Clone)]
pub struct StoreDispatcher {
    gateway: Arc<dyn StoreGateway>,
}

impl StoreDispatcher {
    #[must_use]
    pub fn new(gateway: Arc<dyn StoreGateway>) -> Self {
        Self { gateway }
    }
}

fn required_entity(request: &Request) -> Result<String, RequestError> {
    request
        .entity()
        .map(str::to_string)
        .ok_or(RequestError::Validation(ValidationError::MissingField("entity")))
}

async fn dispatch(gateway: Arc<dyn StoreGateway>, request: Request) -> Result<Execution, RequestError> {
    match request.operation() {
        Operation::Fetch => {
            let query = request.fetch_query()?;
            Ok(Execution::Fetched(gateway.fetch(query).await?))
        }
        Operation::Save => {
            let payload = request.payload().to_vec();
            gateway.save(payload.clone()).await?;
            Ok(Execution::Applied(payload.into_iter().map(Ok).collect()))
        }
        Operation::Delete => {
            let payload = request.payload().to_vec();
            gateway.delete(payload.clone()).await?;
            Ok(Execution::Applied(payload.into_iter().map(Ok).collect()))
        }
        Operation::Upsert => {
            let entity = required_entity(&request)?;
            let outcomes = gateway
                .upsert(entity, request.payload().to_vec(), request.strategy())
                .await?;
            Ok(Execution::Applied(outcomes))
        }
        Operation::Persist => {
            gateway.persist().await?;
            Ok(Execution::Completed)
        }
        Operation::BatchDelete => {
            let entity = required_entity(&request)?;
            let predicate = request.predicate().cloned().unwrap_or(Predicate::All);
            gateway.batch_delete(entity, predicate).await?;
            Ok(Execution::Completed)
        }
        Operation::ResetStore => {
            gateway.reset_store().await?;
            Ok(Execution::Completed)
        }
    }
}

impl Service<Request> for StoreDispatcher {
    type Response = Execution;
    type Error = RequestError;
    type Future = Pin<Box<dyn Future<Output = Result<Execution, RequestError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        Box::pin(dispatch(Arc::clone(&self.gateway), request))
    }
}
