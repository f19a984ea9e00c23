//! RAID-style mirroring of encrypted backup blobs.
//!
//! Each mirror is an independent [`PersistenceBackend`]. Writes and
//! read-back verification fan out to every mirror at once; one mirror's
//! failure is captured as a value and never cancels its siblings.

use std::sync::Arc;

use safekeep_core::{content_hash, BackupCipher};
use safekeep_storage::{keys, PersistenceBackend};
use tokio::task::JoinSet;

/// What one mirror did with one blob. Mirrors are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub mirror: usize,
    pub result: Result<(), String>,
}

/// Read-back verification of one backup across every mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumReport {
    pub verified: usize,
    pub required: usize,
    pub failures: Vec<MirrorOutcome>,
}

impl QuorumReport {
    pub fn is_quorate(&self) -> bool {
        self.verified >= self.required
    }
}

pub struct MirrorSet {
    mirrors: Vec<Arc<dyn PersistenceBackend>>,
    quorum: usize,
}

impl MirrorSet {
    pub fn new(mirrors: Vec<Arc<dyn PersistenceBackend>>, quorum: usize) -> Self {
        MirrorSet { mirrors, quorum }
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Write `blob` under the backup's data key on every mirror.
    pub async fn save(&self, id: &str, blob: Arc<Vec<u8>>) -> Vec<MirrorOutcome> {
        let key = keys::backup_data(id);
        let mut tasks = JoinSet::new();
        for (i, mirror) in self.mirrors.iter().enumerate() {
            let mirror = Arc::clone(mirror);
            let key = key.clone();
            let blob = Arc::clone(&blob);
            tasks.spawn(async move {
                let result = mirror.put(&key, &blob).await.map_err(|e| e.to_string());
                MirrorOutcome {
                    mirror: i + 1,
                    result,
                }
            });
        }
        collect(tasks).await
    }

    /// Read every mirror's copy back, decrypt it and compare its hash to
    /// `master_hash`. An unreachable, missing, undecryptable or mismatched
    /// copy counts against the quorum.
    pub async fn verify(
        &self,
        id: &str,
        master_hash: &str,
        cipher: Arc<BackupCipher>,
    ) -> QuorumReport {
        let key = keys::backup_data(id);
        let mut tasks = JoinSet::new();
        for (i, mirror) in self.mirrors.iter().enumerate() {
            let mirror = Arc::clone(mirror);
            let key = key.clone();
            let cipher = Arc::clone(&cipher);
            let expected = master_hash.to_string();
            tasks.spawn(async move {
                let result = match mirror.get(&key).await {
                    Ok(Some(blob)) => match cipher.decrypt(&blob) {
                        Ok(plain) if content_hash(&plain) == expected => Ok(()),
                        Ok(_) => Err("hash mismatch".to_string()),
                        Err(e) => Err(e.to_string()),
                    },
                    Ok(None) => Err("blob missing".to_string()),
                    Err(e) => Err(e.to_string()),
                };
                MirrorOutcome {
                    mirror: i + 1,
                    result,
                }
            });
        }

        let outcomes = collect(tasks).await;
        let verified = outcomes.iter().filter(|o| o.result.is_ok()).count();
        QuorumReport {
            verified,
            required: self.quorum,
            failures: outcomes.into_iter().filter(|o| o.result.is_err()).collect(),
        }
    }

    /// The first mirror copy of a backup's blob that `accept` vouches for,
    /// in mirror order, with the number of the mirror it came from.
    pub async fn read(
        &self,
        id: &str,
        accept: impl Fn(&[u8]) -> bool + Sync,
    ) -> Option<(usize, Vec<u8>)> {
        let key = keys::backup_data(id);
        for (i, mirror) in self.mirrors.iter().enumerate() {
            match mirror.get(&key).await {
                Ok(Some(blob)) if accept(&blob) => return Some((i + 1, blob)),
                Ok(Some(_)) => {
                    tracing::warn!(mirror = i + 1, backup = id, "mirror copy rejected, trying next")
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(mirror = i + 1, error = %e, "mirror read failed"),
            }
        }
        None
    }
}

async fn collect(mut tasks: JoinSet<MirrorOutcome>) -> Vec<MirrorOutcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::error!(error = %e, "mirror task aborted"),
        }
    }
    outcomes.sort_by_key(|o| o.mirror);
    outcomes
}
