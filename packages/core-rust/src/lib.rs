//! `recordkit` core: records, predicates, requests, version resolution and pagination math.
//!
//! Everything in this crate is runtime-free. The store crate builds the
//! adapter, the request pipeline and the change streams on top of it.

pub mod error;
pub mod pagination;
pub mod predicate;
pub mod request;
pub mod result;
pub mod sections;
pub mod traits;
pub mod types;
pub mod version;

pub use error::{RequestError, StoreError, ValidationError};
pub use pagination::{next_page, CursorDirection, FetchWindow, Pagination, PaginationMode};
pub use predicate::{sort_records, Matcher, Predicate, SortDescriptor};
pub use request::{
    FetchQuery, Operation, Request, RequestBuilder, RequestOverride, VersionConflictStrategy,
};
pub use result::{partition_results, BatchResult, RequestResult, ResultExt};
pub use sections::{group_into_sections, object_at, sections_with_limit, IndexPath, Section};
pub use traits::{Identifiable, PureObject, Versioned};
pub use types::{Record, StoreKind, Value};
pub use version::{resolve, Resolution, VersionUpdateRequest};
