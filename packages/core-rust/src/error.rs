//! Error taxonomy shared by every layer of the request pipeline.
//!
//! Errors fall into two groups: stage-level failures, which collapse an
//! entire pipeline stage into one failed result, and per-item failures,
//! which are captured next to their siblings in a batch result.

use crate::request::Operation;
use crate::types::StoreKind;

/// A request could not be built because it is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("payload record {key} belongs to entity {found}, expected {expected}")]
    EntityMismatch {
        key: String,
        expected: String,
        found: String,
    },
}

/// Failures reported by the store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store is unavailable")]
    Unavailable,
    #[error("failed to persist in-memory scope: {0}")]
    PersistFailure(String),
    #[error("{operation} is not supported by the {kind} store")]
    UnsupportedForStoreKind { operation: Operation, kind: StoreKind },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Every failure a request, or one item of a batch, can end in.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("request generator failed: {0:#}")]
    Generator(anyhow::Error),
    #[error("request filter rejected the request: {0:#}")]
    Filter(anyhow::Error),
    #[error(transparent)]
    Store(StoreError),
    #[error("version conflict on {key}: stored version {existing}, incoming version {incoming}")]
    Conflict {
        key: String,
        existing: u64,
        incoming: u64,
    },
    #[error("result processor failed: {0:#}")]
    Processor(anyhow::Error),
    #[error("{operation} is not supported by the {kind} store")]
    Unsupported { operation: Operation, kind: StoreKind },
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("request failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RequestError>,
    },
}

impl From<StoreError> for RequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedForStoreKind { operation, kind } => {
                RequestError::Unsupported { operation, kind }
            }
            other => RequestError::Store(other),
        }
    }
}

impl RequestError {
    /// Strips retry wrappers and returns the error of the final attempt.
    #[must_use]
    pub fn root(&self) -> &RequestError {
        match self {
            RequestError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Validation(_) => "validation",
            RequestError::Generator(_) => "generator",
            RequestError::Filter(_) => "filter",
            RequestError::Store(_) => "store",
            RequestError::Conflict { .. } => "conflict",
            RequestError::Processor(_) => "processor",
            RequestError::Unsupported { .. } => "unsupported",
            RequestError::Timeout { .. } => "timeout",
            RequestError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
