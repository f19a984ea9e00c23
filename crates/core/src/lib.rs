//! safekeep-core: the state-protection model shared by every safekeep crate.
//!
//! # Public API
//!
//! - [`ApplicationStateSnapshot`] -- the aggregate of entity collections being protected
//! - [`BackupRecord`], [`PointInTimeSnapshot`] -- catalog entries owned by the backup engine
//! - [`crypto`] -- key derivation, authenticated encryption, content hashing
//! - [`validate`] -- structural validation of snapshots, cooperative on large collections
//! - [`AlertChannel`] -- severity-tagged alerts with an external notification hook
//! - [`AuditSink`] / [`MemoryAuditLog`] -- the structured log the watchdog reads back
//! - [`StateSource`], [`EntityStore`], [`ReinitSignal`] -- host-side collaborators
//! - [`SafekeepError`] -- the error taxonomy

/// Schema version stamped on every backup record.
pub const SCHEMA_VERSION: &str = "1.5.0";

pub mod alert;
pub mod audit;
pub mod collaborators;
pub mod crypto;
pub mod error;
pub mod ids;
pub mod record;
pub mod state;
pub mod validate;

// ── Convenience re-exports ───────────────────────────────────────────

pub use alert::{Alert, AlertChannel, AlertMetadata, LogNotifier, Notifier, NotifyError, Severity};
pub use audit::{AuditSink, AuditStatus, LogEntry, LogLevel, MemoryAuditLog};
pub use collaborators::{
    EntityStore, LogReinit, MemoryEntityStore, ReinitSignal, StateSource, StaticStateSource,
};
pub use crypto::{content_hash, derive_key, BackupCipher, EncryptionKey};
pub use error::{IntegrityFailure, PersistenceTier, SafekeepError};
pub use record::{
    BackupKind, BackupRecord, BackupStatus, Compliance, PointInTimeSnapshot, StorageTier,
};
pub use state::{ApplicationStateSnapshot, Collection, EntityCollection};
pub use validate::{validate_full_state, ValidationResult};
