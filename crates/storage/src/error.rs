use std::path::PathBuf;

/// All errors that can be returned by a PersistenceBackend implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key contains characters outside the portable key alphabet.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The write would push the backend past its configured quota.
    #[error("quota exceeded writing {key}: {needed} bytes requested, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// A filesystem operation failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored value could not be decoded (bad encoding, bad JSON).
    #[error("corrupt value under {key}: {message}")]
    Corrupt { key: String, message: String },

    /// A backend-specific storage error.
    #[error("storage backend error: {0}")]
    Backend(String),
}
