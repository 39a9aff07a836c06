//! Tower middleware layers for the request pipeline.
//!
//! - [`metrics`]: Request timing and counting via `tracing` spans and `metrics`
//! - [`filter`]: User-registered request filters
//! - [`retry`]: Immediate retry up to the request's attempt count
//! - [`timeout`]: Per-attempt timeout enforcement
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod filter;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod timeout;

pub use filter::{FilterLayer, RequestFilter};
pub use metrics::MetricsLayer;
pub use pipeline::build_request_pipeline;
pub use retry::RetryLayer;
pub use timeout::TimeoutLayer;
