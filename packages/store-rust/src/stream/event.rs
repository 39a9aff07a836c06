//! Events emitted by a change stream.

use recordkit_core::{IndexPath, Section};

/// One object that moved in, out of or within the watched window.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub object: T,
    /// Position before the change; `None` for inserts.
    pub old_index: Option<IndexPath>,
    /// Position after the change; `None` for deletes.
    pub new_index: Option<IndexPath>,
}

/// A section that appeared, disappeared or changed contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChange {
    pub index: usize,
    pub name: String,
}

/// Change-stream event.
///
/// Per load cycle: `WillLoad`, then zero or more groups of `WillChange`,
/// mutation events and `DidChange`, then `DidLoad` carrying the window.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    WillLoad,
    DidLoad(Vec<Section<T>>),
    WillChange,
    DidChange,
    Insert(Change<T>),
    Update(Change<T>),
    Delete(Change<T>),
    InsertSection(SectionChange),
    UpdateSection(SectionChange),
    DeleteSection(SectionChange),
}

impl<T> ChangeEvent<T> {
    /// Short label for logs and tests.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::WillLoad => "willLoad",
            ChangeEvent::DidLoad(_) => "didLoad",
            ChangeEvent::WillChange => "willChange",
            ChangeEvent::DidChange => "didChange",
            ChangeEvent::Insert(_) => "insert",
            ChangeEvent::Update(_) => "update",
            ChangeEvent::Delete(_) => "delete",
            ChangeEvent::InsertSection(_) => "insertSection",
            ChangeEvent::UpdateSection(_) => "updateSection",
            ChangeEvent::DeleteSection(_) => "deleteSection",
        }
    }
}
