//! Change streams: paginated windows over one entity that follow committed
//! mutations.
//!
//! - [`notifier`]: turns committed main scopes into per-entity notices
//! - [`controller`]: owns the page cursor and the background fetch task
//! - [`event`]: the events a stream emits
//! - `diff`: keyed diff between two windows

pub mod controller;
mod diff;
pub mod event;
pub mod notifier;

pub use controller::{EventStream, PageCursor, SectionKey, StreamController, StreamOptions};
pub use event::{Change, ChangeEvent, SectionChange};
pub use notifier::{ChangeNotifier, StoreNotice};
