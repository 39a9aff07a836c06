//! Declarative request model.
//!
//! A [`Request`] describes exactly one persistence operation. It is built once
//! through [`RequestBuilder`] and never mutated afterwards; derived requests
//! come from [`Request::with_override`], which clones, overrides and
//! re-validates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::predicate::{Predicate, SortDescriptor};
use crate::types::Record;

/// Operation kind carried by a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Fetch,
    /// Insert or update in the in-memory scope.
    Save,
    Delete,
    Upsert,
    /// Flush the in-memory scope to durable storage.
    Persist,
    /// Engine-level bulk delete by predicate.
    BatchDelete,
    /// Drop and recreate the underlying storage.
    ResetStore,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Save => "save",
            Operation::Delete => "delete",
            Operation::Upsert => "upsert",
            Operation::Persist => "persist",
            Operation::BatchDelete => "batchDelete",
            Operation::ResetStore => "resetStore",
        }
    }

    fn requires_entity(self) -> bool {
        matches!(
            self,
            Operation::Fetch | Operation::Delete | Operation::Upsert | Operation::BatchDelete
        )
    }

    fn requires_payload(self) -> bool {
        matches!(self, Operation::Save | Operation::Delete | Operation::Upsert)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an upsert treats a stored record whose version differs from the edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionConflictStrategy {
    /// Fail the item unless both versions match.
    #[default]
    Error,
    /// Always apply the edit.
    Overwrite,
    /// Apply the edit only if its version is at least the stored one.
    TakePreferable,
}

/// The fetch-relevant part of a request, handed to the store adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub entity: String,
    pub predicate: Predicate,
    pub sort: Vec<SortDescriptor>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl FetchQuery {
    /// Fetches every record of `entity`, ordered by primary key.
    #[must_use]
    pub fn all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Predicate::All,
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Immutable description of one persistence operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    operation: Operation,
    entity: Option<String>,
    predicate: Option<Predicate>,
    sort: Vec<SortDescriptor>,
    fetch_limit: Option<usize>,
    fetch_offset: usize,
    payload: Vec<Record>,
    retries: u32,
    strategy: VersionConflictStrategy,
    apply_middlewares: bool,
    description: Option<String>,
}

impl Request {
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Returns a builder pre-populated with every field of this request.
    #[must_use]
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            operation: Some(self.operation),
            entity: self.entity.clone(),
            predicate: self.predicate.clone(),
            sort: self.sort.clone(),
            fetch_limit: self.fetch_limit,
            fetch_offset: self.fetch_offset,
            payload: if self.operation.requires_payload() {
                Some(self.payload.clone())
            } else {
                None
            },
            retries: self.retries,
            strategy: self.strategy,
            apply_middlewares: self.apply_middlewares,
            description: self.description.clone(),
        }
    }

    /// Clones this request with one field replaced.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the derived request is incomplete,
    /// for example when turning a fetch into a save without a payload.
    pub fn with_override(&self, field: RequestOverride) -> Result<Request, ValidationError> {
        self.with_overrides([field])
    }

    /// Clones this request with several fields replaced, in order.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the derived request is incomplete.
    pub fn with_overrides<I>(&self, fields: I) -> Result<Request, ValidationError>
    where
        I: IntoIterator<Item = RequestOverride>,
    {
        let mut builder = self.to_builder();
        for field in fields {
            builder = builder.apply(field);
        }
        builder.build()
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    #[must_use]
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    #[must_use]
    pub fn sort(&self) -> &[SortDescriptor] {
        &self.sort
    }

    #[must_use]
    pub fn fetch_limit(&self) -> Option<usize> {
        self.fetch_limit
    }

    #[must_use]
    pub fn fetch_offset(&self) -> usize {
        self.fetch_offset
    }

    #[must_use]
    pub fn payload(&self) -> &[Record] {
        &self.payload
    }

    /// Number of attempts, always at least 1.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[must_use]
    pub fn strategy(&self) -> VersionConflictStrategy {
        self.strategy
    }

    #[must_use]
    pub fn apply_middlewares(&self) -> bool {
        self.apply_middlewares
    }

    /// Human-readable label used in logs; falls back to `operation entity`.
    #[must_use]
    pub fn description(&self) -> String {
        match (&self.description, &self.entity) {
            (Some(d), _) => d.clone(),
            (None, Some(entity)) => format!("{} {entity}", self.operation),
            (None, None) => self.operation.to_string(),
        }
    }

    /// Extracts the fetch constraints of this request.
    ///
    /// # Errors
    ///
    /// Returns `MissingField("entity")` if the request has no target entity.
    pub fn fetch_query(&self) -> Result<FetchQuery, ValidationError> {
        let entity = self
            .entity
            .clone()
            .ok_or(ValidationError::MissingField("entity"))?;
        Ok(FetchQuery {
            entity,
            predicate: self.predicate.clone().unwrap_or_default(),
            sort: self.sort.clone(),
            limit: self.fetch_limit,
            offset: self.fetch_offset,
        })
    }
}

/// One field replacement for [`Request::with_override`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOverride {
    Operation(Operation),
    Entity(String),
    Predicate(Option<Predicate>),
    Sort(Vec<SortDescriptor>),
    FetchLimit(Option<usize>),
    FetchOffset(usize),
    Payload(Vec<Record>),
    Retries(u32),
    Strategy(VersionConflictStrategy),
    ApplyMiddlewares(bool),
    Description(String),
}

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Request`]. Consumed by [`RequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    operation: Option<Operation>,
    entity: Option<String>,
    predicate: Option<Predicate>,
    sort: Vec<SortDescriptor>,
    fetch_limit: Option<usize>,
    fetch_offset: usize,
    payload: Option<Vec<Record>>,
    retries: u32,
    strategy: VersionConflictStrategy,
    apply_middlewares: bool,
    description: Option<String>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            operation: None,
            entity: None,
            predicate: None,
            sort: Vec::new(),
            fetch_limit: None,
            fetch_offset: 0,
            payload: None,
            retries: 1,
            strategy: VersionConflictStrategy::default(),
            apply_middlewares: true,
            description: None,
        }
    }
}

impl RequestBuilder {
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Vec<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn fetch_offset(mut self, offset: usize) -> Self {
        self.fetch_offset = offset;
        self
    }

    #[must_use]
    pub fn payload(mut self, records: Vec<Record>) -> Self {
        self.payload = Some(records);
        self
    }

    /// Sets the number of attempts. Values below 1 are clamped to 1.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: VersionConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn apply_middlewares(mut self, apply: bool) -> Self {
        self.apply_middlewares = apply;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn apply(self, field: RequestOverride) -> Self {
        match field {
            RequestOverride::Operation(op) => self.operation(op),
            RequestOverride::Entity(entity) => self.entity(entity),
            RequestOverride::Predicate(predicate) => Self { predicate, ..self },
            RequestOverride::Sort(sort) => self.sort(sort),
            RequestOverride::FetchLimit(fetch_limit) => Self { fetch_limit, ..self },
            RequestOverride::FetchOffset(offset) => self.fetch_offset(offset),
            RequestOverride::Payload(records) => self.payload(records),
            RequestOverride::Retries(retries) => self.retries(retries),
            RequestOverride::Strategy(strategy) => self.strategy(strategy),
            RequestOverride::ApplyMiddlewares(apply) => self.apply_middlewares(apply),
            RequestOverride::Description(description) => self.description(description),
        }
    }

    /// Validates and freezes the request.
    ///
    /// # Errors
    ///
    /// - `MissingField("operation")` if no operation was set.
    /// - `MissingField("entity")` for fetch, delete, upsert and batch delete
    ///   without a target entity.
    /// - `MissingField("payload")` for save, delete and upsert without a payload.
    /// - `EntityMismatch` if a payload record targets a different entity.
    pub fn build(self) -> Result<Request, ValidationError> {
        let operation = self
            .operation
            .ok_or(ValidationError::MissingField("operation"))?;

        if operation.requires_entity() && self.entity.is_none() {
            return Err(ValidationError::MissingField("entity"));
        }

        let payload = match self.payload {
            Some(records) => records,
            None if operation.requires_payload() => {
                return Err(ValidationError::MissingField("payload"));
            }
            None => Vec::new(),
        };

        if let Some(expected) = &self.entity {
            if let Some(stray) = payload.iter().find(|r| &r.entity != expected) {
                return Err(ValidationError::EntityMismatch {
                    key: stray.key.clone(),
                    expected: expected.clone(),
                    found: stray.entity.clone(),
                });
            }
        }

        Ok(Request {
            operation,
            entity: self.entity,
            predicate: self.predicate,
            sort: self.sort,
            fetch_limit: self.fetch_limit,
            fetch_offset: self.fetch_offset,
            payload,
            retries: self.retries.max(1),
            strategy: self.strategy,
            apply_middlewares: self.apply_middlewares,
            description: self.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_users() -> Request {
        Request::builder()
            .operation(Operation::Fetch)
            .entity("user")
            .predicate(Predicate::eq("age", 30))
            .fetch_limit(10)
            .build()
            .unwrap()
    }

    #[test]
    fn build_without_operation_fails() {
        let err = Request::builder().entity("user").build().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("operation"));
    }

    #[test]
    fn fetch_delete_upsert_require_entity() {
        for op in [Operation::Fetch, Operation::Delete, Operation::Upsert, Operation::BatchDelete] {
            let err = Request::builder()
                .operation(op)
                .payload(Vec::new())
                .build()
                .unwrap_err();
            assert_eq!(err, ValidationError::MissingField("entity"), "{op}");
        }
    }

    #[test]
    fn save_requires_payload_but_not_entity() {
        let err = Request::builder().operation(Operation::Save).build().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("payload"));

        let ok = Request::builder()
            .operation(Operation::Save)
            .payload(vec![Record::new("user", "u1")])
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn persist_and_reset_need_nothing_else() {
        assert!(Request::builder().operation(Operation::Persist).build().is_ok());
        assert!(Request::builder().operation(Operation::ResetStore).build().is_ok());
    }

    #[test]
    fn retries_are_clamped_to_one() {
        let request = Request::builder()
            .operation(Operation::Persist)
            .retries(0)
            .build()
            .unwrap();
        assert_eq!(request.retries(), 1);
    }

    #[test]
    fn payload_entity_must_match_request_entity() {
        let err = Request::builder()
            .operation(Operation::Upsert)
            .entity("user")
            .payload(vec![Record::new("user", "u1"), Record::new("order", "o1")])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EntityMismatch {
                key: "o1".into(),
                expected: "user".into(),
                found: "order".into(),
            }
        );
    }

    #[test]
    fn defaults_apply_middlewares_and_error_strategy() {
        let request = fetch_users();
        assert!(request.apply_middlewares());
        assert_eq!(request.strategy(), VersionConflictStrategy::Error);
        assert_eq!(request.retries(), 1);
        assert!(request.payload().is_empty());
    }

    #[test]
    fn override_derives_new_request_and_leaves_original_untouched() {
        let fetch = fetch_users();
        let delete = fetch
            .with_overrides([
                RequestOverride::Operation(Operation::BatchDelete),
                RequestOverride::FetchLimit(None),
            ])
            .unwrap();

        assert_eq!(fetch.operation(), Operation::Fetch);
        assert_eq!(fetch.fetch_limit(), Some(10));
        assert_eq!(delete.operation(), Operation::BatchDelete);
        assert_eq!(delete.predicate(), fetch.predicate());
        assert_eq!(delete.fetch_limit(), None);
    }

    #[test]
    fn override_revalidates() {
        let err = fetch_users()
            .with_override(RequestOverride::Operation(Operation::Save))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("payload"));
    }

    #[test]
    fn to_builder_round_trips_payload_requests() {
        let save = Request::builder()
            .operation(Operation::Save)
            .entity("user")
            .payload(vec![Record::new("user", "u1")])
            .retries(3)
            .build()
            .unwrap();
        assert_eq!(save.to_builder().build().unwrap(), save);
    }

    #[test]
    fn fetch_query_carries_window_and_defaults_predicate() {
        let request = Request::builder()
            .operation(Operation::Fetch)
            .entity("user")
            .fetch_offset(20)
            .build()
            .unwrap();
        let query = request.fetch_query().unwrap();
        assert_eq!(query.entity, "user");
        assert_eq!(query.predicate, Predicate::All);
        assert_eq!(query.offset, 20);
        assert_eq!(query.limit, None);
    }

    #[test]
    fn description_falls_back_to_operation_and_entity() {
        assert_eq!(fetch_users().description(), "fetch user");
        let labelled = fetch_users()
            .with_override(RequestOverride::Description("load profile".into()))
            .unwrap();
        assert_eq!(labelled.description(), "load profile");
    }
}
