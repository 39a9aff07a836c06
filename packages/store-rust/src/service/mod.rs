//! Request execution framework.
//!
//! This module implements the request pipeline:
//!
//! 1. **Generation** (`generator`): previous result -> `Request`
//! 2. **Middleware** (`middleware`): Tower layers (metrics, filters, retry, timeout)
//! 3. **Dispatch** (`dispatcher`): `Request` -> `StoreGateway` call by operation
//! 4. **Gateway** (`gateway`): async boundary and mutation queue in front of the store adapter
//! 5. **Result processing** (`result_processor`): records -> caller types
//! 6. **Background workers** (`worker`): the mutation queue and auto-persist ticks

pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod general;
pub mod generator;
pub mod middleware;
pub mod operation;
pub mod processor;
pub mod result_processor;
pub mod upsert;
pub mod worker;

// Re-export key types for convenient access.
pub use config::{ProcessorConfig, StoreConfig};
pub use dispatcher::StoreDispatcher;
pub use gateway::{MutationJob, StoreContext, StoreGateway};
pub use generator::{just, overriding, transformed, RequestGenerator, Transform};
pub use middleware::RequestFilter;
pub use operation::Execution;
pub use processor::RequestProcessor;
pub use result_processor::{typed, RawRecords, ResultProcessor, Typed};
pub use upsert::{plan_upsert, UpsertPlan};
pub use worker::{BackgroundRunnable, BackgroundWorker};
