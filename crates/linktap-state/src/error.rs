//! State store error types.

/// Errors produced by [`StateStore`](crate::StateStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// File-system I/O failure while persisting state.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// State file held something other than the expected JSON shape.
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_wraps() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StateError::Io(inner);
        assert!(err.to_string().contains("i/o"));
    }

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(StateError::LockPoisoned.to_string(), "state store lock poisoned");
    }
}
