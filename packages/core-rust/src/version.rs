//! Optimistic-concurrency resolution for a single edited record.
//!
//! [`resolve`] consumes one [`VersionUpdateRequest`] and decides whether the
//! edit is inserted, applied onto the stored original, silently rejected, or
//! fails with a version conflict. It never touches a store; callers write
//! the returned record back themselves.

use crate::error::RequestError;
use crate::request::VersionConflictStrategy;
use crate::traits::Versioned;
use crate::types::Record;

/// An edited record paired with its stored counterpart, if one exists.
#[derive(Debug, Clone)]
pub struct VersionUpdateRequest {
    pub edited: Record,
    pub original: Option<Record>,
    pub strategy: VersionConflictStrategy,
}

/// Terminal state of a [`VersionUpdateRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No original existed; the edit is written as-is.
    Inserted(Record),
    /// The edit was merged onto the original and the version bumped.
    Applied(Record),
    /// The original was kept unchanged (take-preferable with a stale edit).
    Rejected(Record),
}

impl Resolution {
    #[must_use]
    pub fn record(&self) -> &Record {
        match self {
            Resolution::Inserted(r) | Resolution::Applied(r) | Resolution::Rejected(r) => r,
        }
    }

    #[must_use]
    pub fn into_record(self) -> Record {
        match self {
            Resolution::Inserted(r) | Resolution::Applied(r) | Resolution::Rejected(r) => r,
        }
    }

    /// Whether the store has to be written for this outcome.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(self, Resolution::Rejected(_))
    }
}

/// Resolves one edit against its stored original.
///
/// # Errors
///
/// Returns [`RequestError::Conflict`] under [`VersionConflictStrategy::Error`]
/// when the versions differ. The original is left untouched in that case.
pub fn resolve(request: VersionUpdateRequest) -> Result<Resolution, RequestError> {
    let VersionUpdateRequest {
        edited,
        original,
        strategy,
    } = request;

    let Some(original) = original else {
        return Ok(Resolution::Inserted(edited));
    };

    if original.version() == edited.version() {
        return Ok(Resolution::Applied(apply_edit(original, &edited)));
    }

    match strategy {
        VersionConflictStrategy::Error => Err(RequestError::Conflict {
            key: original.key,
            existing: original.version,
            incoming: edited.version,
        }),
        VersionConflictStrategy::Overwrite => Ok(Resolution::Applied(apply_edit(original, &edited))),
        VersionConflictStrategy::TakePreferable => {
            if edited.has_preferable_version(&original) {
                Ok(Resolution::Applied(apply_edit(original, &edited)))
            } else {
                tracing::debug!(
                    key = %original.key,
                    stored = original.version,
                    incoming = edited.version,
                    "stale edit rejected"
                );
                Ok(Resolution::Rejected(original))
            }
        }
    }
}

/// Copies the edit's domain fields onto the original and bumps the version
/// past both sides.
fn apply_edit(mut original: Record, edited: &Record) -> Record {
    original.merge_fields_from(edited);
    original.version = original.version.max(edited.version).saturating_add(1);
    original
}
