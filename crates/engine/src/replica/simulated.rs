//! In-process replica. Stands in for a cloud provider in tests and in
//! deployments that want the remote tier wired up without a real endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use safekeep_core::BackupRecord;

use super::{RemoteReplica, ReplicaError};

pub struct SimulatedReplica {
    id: String,
    connected: AtomicBool,
    pending_failures: AtomicU32,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    records: Mutex<HashMap<String, BackupRecord>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimulatedReplica {
    pub fn new(id: &str) -> Self {
        SimulatedReplica {
            id: id.to_string(),
            connected: AtomicBool::new(true),
            pending_failures: AtomicU32::new(0),
            blobs: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `n` operations fail.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    pub fn blob_count(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn record(&self, id: &str) -> Option<BackupRecord> {
        lock(&self.records).get(id).cloned()
    }

    fn injected_failure(&self) -> Result<(), ReplicaError> {
        let took = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(ReplicaError::Request {
                replica: self.id.clone(),
                message: "injected failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteReplica for SimulatedReplica {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn upload_blob(&self, key: &str, blob: &[u8]) -> Result<(), ReplicaError> {
        self.injected_failure()?;
        lock(&self.blobs).insert(key.to_string(), blob.to_vec());
        tracing::debug!(replica = %self.id, key, bytes = blob.len(), "blob stored on simulated replica");
        Ok(())
    }

    async fn download_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ReplicaError> {
        self.injected_failure()?;
        Ok(lock(&self.blobs).get(key).cloned())
    }

    async fn upsert_metadata(&self, record: &BackupRecord) -> Result<(), ReplicaError> {
        self.injected_failure()?;
        lock(&self.records).insert(record.id.clone(), record.clone());
        Ok(())
    }
}
