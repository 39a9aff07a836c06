//! Result processors: convert raw records into the caller's output type.
//!
//! A processor runs once per record. A failure only fails that record's
//! item; its siblings are still converted.

use std::fmt;
use std::marker::PhantomData;

use recordkit_core::{PureObject, Record};

/// Converts one stored record into a stage output.
pub trait ResultProcessor: Send + 'static {
    type Output: Send + 'static;

    /// # Errors
    ///
    /// A failure becomes a per-item `RequestError::Processor`.
    fn process(&self, record: Record) -> anyhow::Result<Self::Output>;
}

impl<F, T> ResultProcessor for F
where
    F: Fn(Record) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn process(&self, record: Record) -> anyhow::Result<T> {
        self(record)
    }
}

/// Maps records onto a [`PureObject`] type.
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Typed").field(&std::any::type_name::<T>()).finish()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Typed<T> {}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[must_use]
pub fn typed<T: PureObject>() -> Typed<T> {
    Typed::default()
}

impl<T: PureObject> ResultProcessor for Typed<T> {
    type Output = T;

    fn process(&self, record: Record) -> anyhow::Result<T> {
        anyhow::ensure!(
            record.entity == T::ENTITY,
            "record {} belongs to entity {}, expected {}",
            record.key,
            record.entity,
            T::ENTITY
        );
        T::from_record(&record)
    }
}

/// Hands records through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRecords;

impl ResultProcessor for RawRecords {
    type Output = Record;

    fn process(&self, record: Record) -> anyhow::Result<Record> {
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Dummy;

    #[test]
    fn typed_converts_matching_records() {
        let dummy = Dummy::new("a", "first", 3);
        let converted = typed::<Dummy>().process(dummy.to_record()).unwrap();
        assert_eq!(converted, dummy);
    }

    #[test]
    fn typed_rejects_other_entities_and_missing_fields() {
        let err = typed::<Dummy>()
            .process(Record::new("user", "a"))
            .unwrap_err();
        assert!(err.to_string().contains("expected dummy"));

        assert!(typed::<Dummy>().process(Record::new("dummy", "a")).is_err());
    }

    #[test]
    fn closures_are_processors() {
        let keys = |record: Record| -> anyhow::Result<String> { Ok(record.key) };
        assert_eq!(keys.process(Record::new("dummy", "k")).unwrap(), "k");
        assert_eq!(RawRecords.process(Record::new("dummy", "k")).unwrap().key, "k");
    }
}
