//! In-memory state store for tests and dry runs.

use std::sync::Mutex;

use linktap_types::state::{BookmarkValue, SyncState};

use crate::backend::StateStore;
use crate::error::{Result, StateError};

/// Non-durable [`StateStore`] backed by a mutex-guarded [`SyncState`].
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: Mutex<SyncState>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing state.
    #[must_use]
    pub fn with_state(state: SyncState) -> Self {
        Self { state: Mutex::new(state) }
    }
}

impl StateStore for InMemoryStateStore {
    fn get_bookmark(&self, stream: &str) -> Result<Option<BookmarkValue>> {
        let state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(state.bookmark(stream).cloned())
    }

    fn set_bookmark(&self, stream: &str, value: BookmarkValue) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        state.set_bookmark(stream, value);
        Ok(())
    }

    fn set_currently_syncing(&self, stream: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        state.currently_syncing = stream.map(String::from);
        Ok(())
    }

    fn currently_syncing(&self) -> Result<Option<String>> {
        let state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(state.currently_syncing.clone())
    }

    fn snapshot(&self) -> Result<SyncState> {
        let state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmark_roundtrip() {
        let store = InMemoryStateStore::new();
        assert!(store.get_bookmark("accounts").unwrap().is_none());

        store
            .set_bookmark("accounts", "2024-01-01T00:00:00Z".into())
            .unwrap();
        assert_eq!(
            store.get_bookmark("accounts").unwrap(),
            Some(BookmarkValue::Timestamp("2024-01-01T00:00:00Z".into()))
        );
    }

    #[test]
    fn currently_syncing_set_and_clear() {
        let store = InMemoryStateStore::new();
        store.set_currently_syncing(Some("campaigns")).unwrap();
        assert_eq!(store.currently_syncing().unwrap().as_deref(), Some("campaigns"));

        store.set_currently_syncing(None).unwrap();
        assert!(store.currently_syncing().unwrap().is_none());
    }

    #[test]
    fn seeded_state_is_visible() {
        let mut seed = SyncState::default();
        seed.set_bookmark("campaigns", "2024-06-01T00:00:00Z".into());
        let store = InMemoryStateStore::with_state(seed);
        assert!(store.get_bookmark("campaigns").unwrap().is_some());
    }
}
