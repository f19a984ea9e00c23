//! Logical key layout shared by every persistence tier.
//!
//! ```text
//! backup_data_<id>   encrypted backup blob
//! backup_meta_<id>   BackupRecord JSON
//! backup_list        ordered JSON array of backup ids
//! pitr_snapshots     JSON array of point-in-time snapshots
//! entity_<name>      one entity collection (backend-backed entity store)
//! report_<id>        compliance report JSON
//! ```

use crate::error::StorageError;

pub const BACKUP_LIST: &str = "backup_list";
pub const PITR_SNAPSHOTS: &str = "pitr_snapshots";
pub const BACKUP_DATA_PREFIX: &str = "backup_data_";
pub const BACKUP_META_PREFIX: &str = "backup_meta_";
pub const ENTITY_PREFIX: &str = "entity_";
pub const REPORT_PREFIX: &str = "report_";

pub fn backup_data(id: &str) -> String {
    format!("{BACKUP_DATA_PREFIX}{id}")
}

pub fn backup_meta(id: &str) -> String {
    format!("{BACKUP_META_PREFIX}{id}")
}

pub fn entity(collection: &str) -> String {
    format!("{ENTITY_PREFIX}{collection}")
}

pub fn report(id: &str) -> String {
    format!("{REPORT_PREFIX}{id}")
}

/// Check that `key` is safe to use as a file name on every backend.
///
/// Allowed: ASCII alphanumerics, `_`, `-`, `.`; must not be empty and must
/// not start with `.`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key is empty",
        });
    }
    if key.starts_with('.') {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key starts with '.'",
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key contains characters outside [A-Za-z0-9_.-]",
        });
    }
    Ok(())
}
