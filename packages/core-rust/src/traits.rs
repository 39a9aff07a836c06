//! Capability traits for domain types.
//!
//! Each trait is one capability; generic code composes them through bounds
//! instead of relying on a type hierarchy.

use anyhow::Context as _;

use crate::types::{Record, Value};

/// Has an immutable primary key.
pub trait Identifiable {
    fn primary_key(&self) -> &str;
}

/// Participates in optimistic concurrency.
pub trait Versioned: Identifiable {
    fn version(&self) -> u64;

    /// Whether this (edited) value may replace `original` under the
    /// take-preferable strategy.
    fn has_preferable_version<V: Versioned + ?Sized>(&self, original: &V) -> bool {
        self.version() >= original.version()
    }
}

/// A storage-independent domain value convertible to and from a [`Record`].
pub trait PureObject: Sized + Send + 'static {
    /// Entity name this type is stored under.
    const ENTITY: &'static str;

    fn to_record(&self) -> Record;

    /// # Errors
    ///
    /// Returns an error if a required field is missing or has the wrong type.
    fn from_record(record: &Record) -> anyhow::Result<Self>;
}

impl Identifiable for Record {
    fn primary_key(&self) -> &str {
        &self.key
    }
}

impl Versioned for Record {
    fn version(&self) -> u64 {
        self.version
    }
}

// Typed field access used by `PureObject::from_record` implementations.
impl Record {
    /// # Errors
    ///
    /// Returns an error if the field is absent.
    pub fn require(&self, name: &str) -> anyhow::Result<&Value> {
        self.field(name)
            .with_context(|| format!("{} {}: missing field {name}", self.entity, self.key))
    }

    /// # Errors
    ///
    /// Returns an error if the field is absent or not a string.
    pub fn require_str(&self, name: &str) -> anyhow::Result<&str> {
        self.require(name)?
            .as_str()
            .with_context(|| format!("{} {}: field {name} is not a string", self.entity, self.key))
    }

    /// # Errors
    ///
    /// Returns an error if the field is absent or not an integer.
    pub fn require_i64(&self, name: &str) -> anyhow::Result<i64> {
        self.require(name)?
            .as_i64()
            .with_context(|| format!("{} {}: field {name} is not an integer", self.entity, self.key))
    }

    /// # Errors
    ///
    /// Returns an error if the field is absent or not numeric.
    pub fn require_f64(&self, name: &str) -> anyhow::Result<f64> {
        self.require(name)?
            .as_f64()
            .with_context(|| format!("{} {}: field {name} is not a number", self.entity, self.key))
    }

    /// # Errors
    ///
    /// Returns an error if the field is absent or not a boolean.
    pub fn require_bool(&self, name: &str) -> anyhow::Result<bool> {
        self.require(name)?
            .as_bool()
            .with_context(|| format!("{} {}: field {name} is not a boolean", self.entity, self.key))
    }
}
