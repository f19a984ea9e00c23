//! Error taxonomy for state protection.
//!
//! Failures carry typed metadata (which integrity check failed, which tier
//! refused a write) rather than free-form maps, so callers can match on
//! them and alerts can render them without parsing strings.

use std::fmt;

use safekeep_storage::StorageError;

/// Which integrity check rejected a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityFailure {
    /// The blob is shorter than a nonce plus an authentication tag.
    Truncated { len: usize, min: usize },
    /// The AEAD tag did not verify: wrong key or modified bytes.
    AuthenticationFailed,
    /// The decrypted payload does not hash to the recorded content hash.
    HashMismatch { expected: String, actual: String },
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityFailure::Truncated { len, min } => {
                write!(f, "blob truncated ({len} bytes, need at least {min})")
            }
            IntegrityFailure::AuthenticationFailed => write!(f, "authentication tag mismatch"),
            IntegrityFailure::HashMismatch { expected, actual } => {
                write!(f, "content hash mismatch (expected {expected}, got {actual})")
            }
        }
    }
}

/// A persistence tier, as named in error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceTier {
    Local,
    Fallback,
    /// A RAID-style mirror, numbered from 1.
    Mirror(usize),
    /// A remote replica, by its configured id.
    Remote(String),
}

impl fmt::Display for PersistenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceTier::Local => write!(f, "local"),
            PersistenceTier::Fallback => write!(f, "fallback"),
            PersistenceTier::Mirror(n) => write!(f, "mirror {n}"),
            PersistenceTier::Remote(id) => write!(f, "remote replica {id}"),
        }
    }
}

/// Every failure the state-protection subsystem reports to its callers.
#[derive(Debug, thiserror::Error)]
pub enum SafekeepError {
    /// The snapshot failed structural validation.
    #[error("state validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// A stored blob failed decryption or hash verification.
    #[error("integrity check failed for {subject}: {failure}")]
    Integrity {
        subject: String,
        failure: IntegrityFailure,
    },

    /// The cipher refused to seal a payload.
    #[error("encryption failed")]
    Encryption,

    /// The circuit breaker is open and the call was not attempted.
    #[error("circuit open for {client}, retry in {retry_after_ms} ms")]
    CircuitOpen { client: String, retry_after_ms: u64 },

    /// A write to a persistence tier failed.
    #[error("{tier} persistence failed: {source}")]
    Persistence {
        tier: PersistenceTier,
        #[source]
        source: StorageError,
    },

    /// Reading the entity store failed while capturing state.
    #[error("state capture failed: {source}")]
    Capture {
        #[source]
        source: StorageError,
    },

    /// Writing a restored state back to the entity store failed.
    #[error("restore failed at {stage}: {source}")]
    Restore {
        stage: String,
        #[source]
        source: StorageError,
    },

    /// A snapshot or record could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration was rejected before any work was attempted.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SafekeepError {
    /// Shorthand for an [`SafekeepError::Integrity`] error.
    pub fn integrity(subject: impl Into<String>, failure: IntegrityFailure) -> Self {
        SafekeepError::Integrity {
            subject: subject.into(),
            failure,
        }
    }

    /// True for failures that mean stored data is damaged, as opposed to
    /// an infrastructure problem that may clear on retry.
    pub fn is_integrity(&self) -> bool {
        matches!(self, SafekeepError::Integrity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_error() {
        let err = SafekeepError::Validation {
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "state validation failed: a; b");
    }

    #[test]
    fn persistence_error_names_tier_and_keeps_source() {
        let err = SafekeepError::Persistence {
            tier: PersistenceTier::Mirror(2),
            source: StorageError::Backend("disk full".into()),
        };
        assert!(err.to_string().starts_with("mirror 2 persistence failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn hash_mismatch_renders_both_hashes() {
        let err = SafekeepError::integrity(
            "backup_1",
            IntegrityFailure::HashMismatch {
                expected: "aa".into(),
                actual: "bb".into(),
            },
        );
        assert!(err.is_integrity());
        let msg = err.to_string();
        assert!(msg.contains("backup_1"));
        assert!(msg.contains("expected aa, got bb"));
    }
}
