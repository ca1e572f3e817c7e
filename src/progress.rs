//! Status transitions driven by reading-progress updates.

use crate::model::ReadStatus;

/// Applies a progress update to an article's lifecycle status.
///
/// The machine only ever advances: crossing into the open interval
/// (0, 100) starts an unread article, reaching 100 finishes anything not
/// already finished, and nothing here moves an article backwards.
///
/// `archived` is sticky: stray progress events (a background tab reporting
/// scroll on an article the user explicitly shelved) must not resurrect it.
/// Unarchiving is an explicit status update, not a side effect.
pub fn advance_status(current: ReadStatus, progress_percent: u8) -> ReadStatus {
    match current {
        ReadStatus::Archived => ReadStatus::Archived,
        ReadStatus::Unread if progress_percent > 0 && progress_percent < 100 => {
            ReadStatus::InProgress
        }
        _ if progress_percent >= 100 && current != ReadStatus::Finished => ReadStatus::Finished,
        _ => current,
    }
}
