//! State store trait definition.

use linktap_types::state::{BookmarkValue, SyncState};

use crate::error;

/// Storage contract for tap bookmarks and the currently-syncing marker.
///
/// Every mutation persists immediately, so an external interruption loses
/// at most one page of progress, never a committed bookmark.
pub trait StateStore: Send + Sync {
    /// The persisted bookmark for `stream`, or `None` on first sync.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn get_bookmark(&self, stream: &str) -> error::Result<Option<BookmarkValue>>;

    /// Upsert and persist the bookmark for `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn set_bookmark(&self, stream: &str, value: BookmarkValue) -> error::Result<()>;

    /// Set or clear the currently-syncing marker and persist.
    ///
    /// Set before a top-level stream's traversal begins; cleared only
    /// after the stream and all its descendants finish.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn set_currently_syncing(&self, stream: Option<&str>) -> error::Result<()>;

    /// The currently-syncing marker, if the previous run was interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn currently_syncing(&self) -> error::Result<Option<String>>;

    /// A copy of the full persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn snapshot(&self) -> error::Result<SyncState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (used as `&dyn StateStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn StateStore) {}
    }
}
