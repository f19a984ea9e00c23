//! Point-in-time snapshot history: a capped FIFO list kept in one key of
//! the primary backend.

use std::sync::Arc;

use safekeep_core::PointInTimeSnapshot;
use safekeep_storage::{keys, read_json, write_json, PersistenceBackend, StorageError};

pub struct SnapshotLog {
    backend: Arc<dyn PersistenceBackend>,
    cap: usize,
}

impl SnapshotLog {
    pub fn new(backend: Arc<dyn PersistenceBackend>, cap: usize) -> Self {
        SnapshotLog {
            backend,
            cap: cap.max(1),
        }
    }

    /// Every retained snapshot, oldest first.
    pub async fn list(&self) -> Result<Vec<PointInTimeSnapshot>, StorageError> {
        Ok(read_json(self.backend.as_ref(), keys::PITR_SNAPSHOTS)
            .await?
            .unwrap_or_default())
    }

    /// Append `snapshot`, evicting the oldest entries beyond the cap.
    /// Returns the ids of evicted snapshots.
    pub async fn append(&self, snapshot: PointInTimeSnapshot) -> Result<Vec<String>, StorageError> {
        let mut history = self.list().await?;
        history.push(snapshot);
        let excess = history.len().saturating_sub(self.cap);
        let evicted: Vec<String> = history.drain(..excess).map(|s| s.id).collect();
        write_json(self.backend.as_ref(), keys::PITR_SNAPSHOTS, &history).await?;
        Ok(evicted)
    }

    pub async fn find(&self, id: &str) -> Result<Option<PointInTimeSnapshot>, StorageError> {
        Ok(self.list().await?.into_iter().find(|s| s.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safekeep_core::ApplicationStateSnapshot;
    use safekeep_storage::MemoryBackend;

    fn snap(n: usize) -> PointInTimeSnapshot {
        PointInTimeSnapshot {
            id: format!("snap{n}"),
            timestamp: safekeep_core::ids::now(),
            label: Some(format!("label {n}")),
            state: ApplicationStateSnapshot::empty(),
        }
    }

    #[tokio::test]
    async fn eleventh_snapshot_evicts_the_oldest() {
        let log = SnapshotLog::new(Arc::new(MemoryBackend::new("pitr")), 10);
        for n in 1..=10 {
            assert!(log.append(snap(n)).await.unwrap().is_empty());
        }
        let evicted = log.append(snap(11)).await.unwrap();
        assert_eq!(evicted, vec!["snap1".to_string()]);

        let ids: Vec<String> = log.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids.first().map(String::as_str), Some("snap2"));
        assert_eq!(ids.last().map(String::as_str), Some("snap11"));
    }

    #[tokio::test]
    async fn find_by_id() {
        let log = SnapshotLog::new(Arc::new(MemoryBackend::new("pitr")), 3);
        log.append(snap(1)).await.unwrap();
        assert!(log.find("snap1").await.unwrap().is_some());
        assert!(log.find("nope").await.unwrap().is_none());
    }
}
