//! Live state read from a JSON snapshot file.

use std::path::PathBuf;

use async_trait::async_trait;
use safekeep_core::{ApplicationStateSnapshot, StateSource};

/// Reads the snapshot file on every capture. A missing or unreadable file
/// yields an empty state, which the validator then rejects.
pub struct FileStateSource {
    path: PathBuf,
}

impl FileStateSource {
    pub fn new(path: PathBuf) -> Self {
        FileStateSource { path }
    }
}

#[async_trait]
impl StateSource for FileStateSource {
    async fn current_state(&self) -> ApplicationStateSnapshot {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable");
                return ApplicationStateSnapshot::empty();
            }
        };
        match ApplicationStateSnapshot::from_bytes(&bytes) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file is not a snapshot");
                ApplicationStateSnapshot::empty()
            }
        }
    }
}
