//! Persisted sync state: per-stream bookmarks and the crash-recovery marker.
//!
//! Serializes to the wire format downstream consumers expect:
//!
//! ```json
//! {"bookmarks": {"accounts": "2024-01-01T00:00:00Z"}, "currently_syncing": "accounts"}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stream's persisted high-watermark.
///
/// Untagged so timestamps persist as bare strings and seen-sets as arrays
/// of composite-key tuples, matching the historical state format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookmarkValue {
    /// RFC 3339 timestamp for incremental streams.
    Timestamp(String),
    /// Composite keys already emitted, for streams without a monotonic
    /// replication key.
    SeenSet(Vec<Vec<String>>),
}

impl BookmarkValue {
    /// The timestamp, if this is a scalar bookmark.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<&str> {
        match self {
            Self::Timestamp(value) => Some(value),
            Self::SeenSet(_) => None,
        }
    }

    /// The seen-set, if this is a seen-set bookmark.
    #[must_use]
    pub fn as_seen_set(&self) -> Option<&[Vec<String>]> {
        match self {
            Self::Timestamp(_) => None,
            Self::SeenSet(keys) => Some(keys),
        }
    }
}

impl From<String> for BookmarkValue {
    fn from(value: String) -> Self {
        Self::Timestamp(value)
    }
}

impl From<&str> for BookmarkValue {
    fn from(value: &str) -> Self {
        Self::Timestamp(value.to_string())
    }
}

/// Full persisted state for one tap invocation.
///
/// Full-table streams never appear in `bookmarks`. `currently_syncing`
/// is set while a top-level stream (and its descendants) is in flight; a
/// value present at load time means the previous run was interrupted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BookmarkValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_syncing: Option<String>,
}

impl SyncState {
    /// The bookmark for `stream`, if one has been persisted.
    #[must_use]
    pub fn bookmark(&self, stream: &str) -> Option<&BookmarkValue> {
        self.bookmarks.get(stream)
    }

    /// Upsert the bookmark for `stream`.
    pub fn set_bookmark(&mut self, stream: &str, value: BookmarkValue) {
        self.bookmarks.insert(stream.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_bookmark_serializes_as_bare_string() {
        let mut state = SyncState::default();
        state.set_bookmark("accounts", "2024-01-01T00:00:00Z".into());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"bookmarks": {"accounts": "2024-01-01T00:00:00Z"}})
        );
    }

    #[test]
    fn seen_set_bookmark_serializes_as_tuple_array() {
        let mut state = SyncState::default();
        state.set_bookmark(
            "account_users",
            BookmarkValue::SeenSet(vec![vec!["123".into(), "abc".into()]]),
        );
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"bookmarks": {"account_users": [["123", "abc"]]}})
        );
    }

    #[test]
    fn currently_syncing_is_omitted_when_absent() {
        let state = SyncState::default();
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("currently_syncing"));
    }

    #[test]
    fn state_roundtrips_through_wire_format() {
        let raw = r#"{"bookmarks":{"accounts":"2024-06-01T12:00:00Z","account_users":[["1","u"]]},"currently_syncing":"campaigns"}"#;
        let state: SyncState = serde_json::from_str(raw).unwrap();
        assert_eq!(
            state.bookmark("accounts").and_then(BookmarkValue::as_timestamp),
            Some("2024-06-01T12:00:00Z")
        );
        assert_eq!(state.currently_syncing.as_deref(), Some("campaigns"));
        let back = serde_json::to_string(&state).unwrap();
        let reparsed: SyncState = serde_json::from_str(&back).unwrap();
        assert_eq!(state, reparsed);
    }
}
