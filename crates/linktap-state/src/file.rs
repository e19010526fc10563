//! Write-through JSON-file state store.
//!
//! Every mutation rewrites the whole state file via a temp-file rename,
//! so a crash leaves either the old state or the new state, never a
//! torn write.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use linktap_types::state::{BookmarkValue, SyncState};

use crate::backend::StateStore;
use crate::error::{Result, StateError};

/// Durable [`StateStore`] persisting to a single JSON file.
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    state: Mutex<SyncState>,
}

impl JsonFileStateStore {
    /// Open `path`, loading existing state or starting empty when the
    /// file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the file exists but cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => SyncState::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SyncState::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateStore for JsonFileStateStore {
    fn get_bookmark(&self, stream: &str) -> Result<Option<BookmarkValue>> {
        let state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(state.bookmark(stream).cloned())
    }

    fn set_bookmark(&self, stream: &str, value: BookmarkValue) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        state.set_bookmark(stream, value);
        tracing::info!(stream, "Write state for stream");
        self.flush(&state)
    }

    fn set_currently_syncing(&self, stream: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| StateError::LockPoisoned)?;
        state.currently_syncing = stream.map(String::from);
        self.flush(&state)
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
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::open(dir.path().join("state.json")).unwrap();
        assert!(store.get_bookmark("accounts").unwrap().is_none());
        assert!(store.currently_syncing().unwrap().is_none());
    }

    #[test]
    fn mutations_are_visible_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStateStore::open(&path).unwrap();
        store
            .set_bookmark("accounts", "2024-01-01T00:00:00Z".into())
            .unwrap();
        store.set_currently_syncing(Some("accounts")).unwrap();
        drop(store);

        let reopened = JsonFileStateStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_bookmark("accounts").unwrap(),
            Some(BookmarkValue::Timestamp("2024-01-01T00:00:00Z".into()))
        );
        assert_eq!(
            reopened.currently_syncing().unwrap().as_deref(),
            Some("accounts")
        );
    }

    #[test]
    fn file_matches_wire_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStateStore::open(&path).unwrap();
        store
            .set_bookmark("campaigns", "2024-06-01T00:00:00Z".into())
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["bookmarks"]["campaigns"], "2024-06-01T00:00:00Z");
        assert!(parsed.get("currently_syncing").is_none());
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStateStore::open(&path).is_err());
    }
}
