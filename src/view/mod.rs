//! Point-in-time reconstruction over archived documents.
//!
//! Views are pure functions of a document and a query time. A change-log
//! entry stamped `t` holds the value in effect just before `t`, so the value
//! at `T` comes from the earliest entry strictly after `T`, or from the
//! current snapshot when no such entry exists.

mod document_view;
mod table_view;

pub use document_view::AlarmDocumentView;
pub use table_view::AlarmTableView;

use crate::document::StateChange;

/// Earliest entry with `time > at`. Store merges can reorder entries, so the
/// log is not assumed sorted; among equal times the first appended wins.
pub(crate) fn first_change_after<S: StateChange>(changes: &[S], at: i64) -> Option<&S> {
    changes
        .iter()
        .filter(|c| c.time() > at)
        .fold(None, |best: Option<&S>, c| match best {
            Some(b) if b.time() <= c.time() => Some(b),
            _ => Some(c),
        })
}
