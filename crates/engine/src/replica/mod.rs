//! Remote replicas: the off-site persistence tier.
//!
//! A [`RemoteReplica`] stores encrypted backup blobs by key and keeps a copy
//! of each backup record. The [`ReplicaSet`] fans a backup out to every
//! configured replica, each behind its own [`ResilientClient`], so one slow
//! or failing provider never holds up or trips the breaker of another.

#[cfg(feature = "http")]
pub mod http;
pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use safekeep_core::BackupRecord;
use safekeep_storage::keys;
use tokio::task::JoinSet;

use crate::config::ResilienceConfig;
use crate::resilience::{HealthMetrics, ResilientClient};

#[cfg(feature = "http")]
pub use http::HttpReplica;
pub use simulated::SimulatedReplica;

// ──────────────────────────────────────────────
// ReplicaError
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    #[error("replica '{replica}' is not connected")]
    Disconnected { replica: String },

    #[error("replica '{replica}' request failed: {message}")]
    Request { replica: String, message: String },

    #[error("replica '{replica}' answered with status {status}")]
    Status { replica: String, status: u16 },
}

// ──────────────────────────────────────────────
// RemoteReplica trait
// ──────────────────────────────────────────────

#[async_trait]
pub trait RemoteReplica: Send + Sync + 'static {
    /// Identifier used in logs, metrics, and tier reports.
    fn id(&self) -> &str;

    /// Cheap connectivity probe. Disconnected replicas are skipped.
    async fn is_connected(&self) -> bool;

    async fn upload_blob(&self, key: &str, blob: &[u8]) -> Result<(), ReplicaError>;

    /// Returns `Ok(None)` when the replica has no blob under `key`.
    async fn download_blob(&self, key: &str) -> Result<Option<Vec<u8>>, ReplicaError>;

    /// Insert or replace the replica's copy of a backup record.
    async fn upsert_metadata(&self, record: &BackupRecord) -> Result<(), ReplicaError>;
}

// ──────────────────────────────────────────────
// ReplicaSet
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaOutcome {
    Replicated,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaReport {
    pub replica: String,
    pub outcome: ReplicaOutcome,
}

struct Member {
    replica: Arc<dyn RemoteReplica>,
    client: ResilientClient,
}

impl Member {
    async fn replicate(&self, record: &BackupRecord, blob: &[u8]) -> ReplicaOutcome {
        if !self.replica.is_connected().await {
            return ReplicaOutcome::Skipped;
        }
        let key = keys::backup_data(&record.id);
        if let Err(e) = self
            .client
            .call(|| self.replica.upload_blob(&key, blob))
            .await
        {
            return ReplicaOutcome::Failed(e.to_string());
        }
        match self
            .client
            .call(|| self.replica.upsert_metadata(record))
            .await
        {
            Ok(()) => ReplicaOutcome::Replicated,
            Err(e) => ReplicaOutcome::Failed(e.to_string()),
        }
    }
}

/// Every configured remote replica, each with its own resilient client.
pub struct ReplicaSet {
    resilience: ResilienceConfig,
    members: Vec<Arc<Member>>,
}

impl ReplicaSet {
    pub fn new(resilience: ResilienceConfig) -> Self {
        ReplicaSet {
            resilience,
            members: Vec::new(),
        }
    }

    pub fn add(&mut self, replica: Arc<dyn RemoteReplica>) {
        let client = ResilientClient::new(format!("replica:{}", replica.id()), &self.resilience);
        self.members.push(Arc::new(Member { replica, client }));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.replica.id().to_string())
            .collect()
    }

    /// Upload `blob` and `record` to every replica concurrently. A failing
    /// replica never cancels the others.
    pub async fn replicate(&self, record: &BackupRecord, blob: Arc<Vec<u8>>) -> Vec<ReplicaReport> {
        let mut tasks = JoinSet::new();
        for member in &self.members {
            let member = Arc::clone(member);
            let record = record.clone();
            let blob = Arc::clone(&blob);
            tasks.spawn(async move {
                let outcome = member.replicate(&record, &blob).await;
                ReplicaReport {
                    replica: member.replica.id().to_string(),
                    outcome,
                }
            });
        }

        let mut reports = Vec::with_capacity(self.members.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(error = %e, "replica task aborted"),
            }
        }
        reports.sort_by(|a, b| a.replica.cmp(&b.replica));
        reports
    }

    /// First copy of `key` on a connected replica that `accept` vouches
    /// for, in configuration order.
    pub async fn fetch_blob(
        &self,
        key: &str,
        accept: impl Fn(&[u8]) -> bool + Sync,
    ) -> Option<Vec<u8>> {
        for member in &self.members {
            if !member.replica.is_connected().await {
                continue;
            }
            match member
                .client
                .call(|| member.replica.download_blob(key))
                .await
            {
                Ok(Some(blob)) if accept(&blob) => return Some(blob),
                Ok(Some(_)) => {
                    tracing::warn!(replica = member.replica.id(), key, "remote copy rejected")
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(replica = member.replica.id(), error = %e, "remote read failed")
                }
            }
        }
        None
    }

    pub fn health(&self) -> Vec<HealthMetrics> {
        self.members
            .iter()
            .map(|m| m.client.health_metrics())
            .collect()
    }
}
