//! Backup catalog entries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::state::ApplicationStateSnapshot;

/// Why a backup was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupKind {
    /// Taken by the watchdog or another scheduled trigger. Skipped when the
    /// state does not validate.
    Auto,
    /// Requested by an operator.
    Manual,
    /// Taken alongside a point-in-time snapshot.
    Snapshot,
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackupKind::Auto => "AUTO",
            BackupKind::Manual => "MANUAL",
            BackupKind::Snapshot => "SNAPSHOT",
        })
    }
}

impl FromStr for BackupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(BackupKind::Auto),
            "MANUAL" => Ok(BackupKind::Manual),
            "SNAPSHOT" => Ok(BackupKind::Snapshot),
            other => Err(format!("unknown backup kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Integrated,
    Corrupted,
    Pending,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackupStatus::Integrated => "INTEGRATED",
            BackupStatus::Corrupted => "CORRUPTED",
            BackupStatus::Pending => "PENDING",
        })
    }
}

/// A class of persistence tier a backup reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageTier {
    Local,
    Mirror,
    Remote,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageTier::Local => "LOCAL",
            StorageTier::Mirror => "MIRROR",
            StorageTier::Remote => "REMOTE",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    pub integrity_checked: bool,
    pub georeplicated: bool,
    pub encrypted: bool,
}

/// Metadata for one backup. The encrypted payload lives separately under
/// the record's data key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(alias = "version")]
    pub schema_version: String,
    /// SHA-256 hex of the plaintext snapshot bytes.
    #[serde(alias = "checksum")]
    pub content_hash: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    /// Size of the plaintext snapshot bytes.
    #[serde(alias = "size")]
    pub size_bytes: u64,
    pub status: BackupStatus,
    #[serde(default)]
    pub storage_tiers: BTreeSet<StorageTier>,
    #[serde(default)]
    pub compliance: Compliance,
}

impl BackupRecord {
    pub fn has_tier(&self, tier: StorageTier) -> bool {
        self.storage_tiers.contains(&tier)
    }

    /// Tiers as a comma-separated list, for display.
    pub fn tier_list(&self) -> String {
        self.storage_tiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A labelled full copy of the state, kept in a short FIFO history for
/// rewinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointInTimeSnapshot {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub state: ApplicationStateSnapshot,
}
