//! Result container aliases and helpers.
//!
//! An outcome is a plain [`Result`]: exactly one of success or failure is
//! populated. A batch outcome is a stage-level result wrapping one result per
//! input item, in input order.

use std::fmt::Display;

use crate::error::RequestError;

/// Outcome of a single pipeline stage or a single batch item.
pub type RequestResult<T> = Result<T, RequestError>;

/// Outcome of a batch stage: the stage can fail as a whole, and every item
/// carries its own result.
pub type BatchResult<T> = RequestResult<Vec<RequestResult<T>>>;

/// Presentation helpers for outcomes.
pub trait ResultExt<T> {
    /// Renders the success value, or `placeholder` on failure.
    fn display_or(&self, placeholder: &str) -> String
    where
        T: Display;
}

impl<T> ResultExt<T> for RequestResult<T> {
    fn display_or(&self, placeholder: &str) -> String
    where
        T: Display,
    {
        match self {
            Ok(value) => value.to_string(),
            Err(_) => placeholder.to_string(),
        }
    }
}

/// Splits per-item results into successes and failures, preserving order
/// within each group.
pub fn partition_results<T>(items: Vec<RequestResult<T>>) -> (Vec<T>, Vec<RequestError>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for item in items {
        match item {
            Ok(value) => successes.push(value),
            Err(err) => failures.push(err),
        }
    }
    (successes, failures)
}
