//! Document store error types.

/// Errors produced by [`DocumentStore`](crate::DocumentStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("document store lock poisoned")]
    LockPoisoned,

    /// Stored document body failed to encode or decode.
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A saved document body was not a JSON object.
    #[error("document body must be a JSON object")]
    InvalidDocument,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            StoreError::LockPoisoned.to_string(),
            "document store lock poisoned"
        );
    }

    #[test]
    fn io_error_wraps() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StoreError::Io(inner);
        assert!(err.to_string().contains("i/o"));
    }

    #[test]
    fn codec_error_wraps() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::Codec(inner);
        assert!(err.to_string().contains("codec"));
    }
}
