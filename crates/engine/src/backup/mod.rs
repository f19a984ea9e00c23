//! The backup/snapshot engine.
//!
//! A full backup moves through capture, validation, encryption and then the
//! persistence tiers in order of importance:
//!
//! 1. the local primary backend (mandatory) and an optional fallback backend
//! 2. RAID-style mirrors, accepted only when a quorum reads back intact
//! 3. remote replicas, best-effort
//!
//! Only a failure in the primary path fails the backup. Mirror and remote
//! failures shrink the record's `storage_tiers` and raise a WARNING.
//!
//! Point-in-time snapshots are the lightweight sibling: a capped FIFO list
//! of plaintext states in the primary backend.

pub mod pitr;
pub mod raid;
pub mod report;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use safekeep_core::audit::context;
use safekeep_core::{
    content_hash, ids, validate_full_state, AlertChannel, AlertMetadata, ApplicationStateSnapshot,
    AuditSink, AuditStatus, BackupCipher, BackupKind, BackupRecord, BackupStatus, Collection,
    Compliance, EncryptionKey, EntityStore, IntegrityFailure, LogLevel, LogReinit,
    MemoryAuditLog, MemoryEntityStore, PersistenceTier, PointInTimeSnapshot, ReinitSignal,
    SafekeepError, Severity, StateSource, StaticStateSource, StorageTier,
};
use safekeep_storage::{keys, read_json, write_json, PersistenceBackend, StorageError};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::replica::{RemoteReplica, ReplicaOutcome, ReplicaSet};
use crate::resilience::HealthMetrics;

pub use pitr::SnapshotLog;
pub use raid::{MirrorOutcome, MirrorSet, QuorumReport};
pub use report::{ComplianceReport, SecurityPosture};

/// Catalog entries scanned between cooperative yields.
const CATALOG_YIELD_EVERY: usize = 50;

/// Result of [`BackupEngine::validate_all_backups`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub checked: usize,
    /// Backups whose blob failed decryption or hash comparison.
    pub corrupted: Vec<String>,
    /// Backups with metadata but no blob on any tier.
    pub missing: Vec<String>,
}

// ──────────────────────────────────────────────
// Builder
// ──────────────────────────────────────────────

pub struct BackupEngineBuilder {
    config: EngineConfig,
    key: Option<EncryptionKey>,
    secret: Option<Vec<u8>>,
    primary: Option<Arc<dyn PersistenceBackend>>,
    fallback: Option<Arc<dyn PersistenceBackend>>,
    mirrors: Vec<Arc<dyn PersistenceBackend>>,
    replicas: Vec<Arc<dyn RemoteReplica>>,
    source: Option<Arc<dyn StateSource>>,
    store: Option<Arc<dyn EntityStore>>,
    reinit: Option<Arc<dyn ReinitSignal>>,
    audit: Option<Arc<dyn AuditSink>>,
    alerts: Option<Arc<AlertChannel>>,
}

impl BackupEngineBuilder {
    /// Derive the encryption key from `secret` with the configured salt and
    /// iteration count.
    pub fn secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Use an already-derived key.
    pub fn key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn primary(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.primary = Some(backend);
        self
    }

    pub fn fallback(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.fallback = Some(backend);
        self
    }

    pub fn mirror(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.mirrors.push(backend);
        self
    }

    pub fn replica(mut self, replica: Arc<dyn RemoteReplica>) -> Self {
        self.replicas.push(replica);
        self
    }

    pub fn state_source(mut self, source: Arc<dyn StateSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reinit(mut self, reinit: Arc<dyn ReinitSignal>) -> Self {
        self.reinit = Some(reinit);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Alert channel to raise alerts on. Defaults to a channel over the
    /// engine's audit sink with no external notifier.
    pub fn alerts(mut self, alerts: Arc<AlertChannel>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn build(self) -> Result<BackupEngine, SafekeepError> {
        self.config.validate()?;
        let primary = self
            .primary
            .ok_or_else(|| SafekeepError::Config("a primary backend is required".into()))?;
        if !self.mirrors.is_empty() && self.mirrors.len() < self.config.mirror_quorum {
            return Err(SafekeepError::Config(format!(
                "{} mirrors cannot reach a quorum of {}",
                self.mirrors.len(),
                self.config.mirror_quorum
            )));
        }
        let cipher = match (self.key, self.secret) {
            (Some(key), _) => BackupCipher::new(&key),
            (None, Some(secret)) => BackupCipher::from_secret(
                &secret,
                self.config.encryption.salt.as_bytes(),
                self.config.encryption.iterations,
            ),
            (None, None) => {
                return Err(SafekeepError::Config(
                    "an encryption secret or key is required".into(),
                ))
            }
        };

        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(MemoryAuditLog::new()));
        let alerts = self
            .alerts
            .unwrap_or_else(|| Arc::new(AlertChannel::new(Arc::clone(&audit))));
        let mut replicas = ReplicaSet::new(self.config.resilience.clone());
        for replica in self.replicas {
            replicas.add(replica);
        }

        Ok(BackupEngine {
            cipher: Arc::new(cipher),
            snapshots: SnapshotLog::new(Arc::clone(&primary), self.config.max_snapshots),
            mirrors: MirrorSet::new(self.mirrors, self.config.mirror_quorum),
            primary,
            fallback: self.fallback,
            replicas,
            source: self
                .source
                .unwrap_or_else(|| Arc::new(StaticStateSource::new(ApplicationStateSnapshot::empty()))),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryEntityStore::new())),
            reinit: self.reinit.unwrap_or_else(|| Arc::new(LogReinit)),
            audit,
            alerts,
            writer: Mutex::new(()),
            config: self.config,
        })
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

pub struct BackupEngine {
    config: EngineConfig,
    cipher: Arc<BackupCipher>,
    primary: Arc<dyn PersistenceBackend>,
    fallback: Option<Arc<dyn PersistenceBackend>>,
    mirrors: MirrorSet,
    replicas: ReplicaSet,
    snapshots: SnapshotLog,
    source: Arc<dyn StateSource>,
    store: Arc<dyn EntityStore>,
    reinit: Arc<dyn ReinitSignal>,
    audit: Arc<dyn AuditSink>,
    alerts: Arc<AlertChannel>,
    /// Held by every operation that writes backups or restores state.
    writer: Mutex<()>,
}

fn local(source: StorageError) -> SafekeepError {
    SafekeepError::Persistence {
        tier: PersistenceTier::Local,
        source,
    }
}

/// Re-attribute a cipher error to the backup it was opening.
fn for_backup(id: &str, err: SafekeepError) -> SafekeepError {
    match err {
        SafekeepError::Integrity { failure, .. } => SafekeepError::integrity(format!("backup {id}"), failure),
        other => other,
    }
}

async fn append_catalog(backend: &dyn PersistenceBackend, id: &str) -> Result<(), StorageError> {
    let mut ids: Vec<String> = read_json(backend, keys::BACKUP_LIST).await?.unwrap_or_default();
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
    write_json(backend, keys::BACKUP_LIST, &ids).await
}

impl BackupEngine {
    pub fn builder(config: EngineConfig) -> BackupEngineBuilder {
        BackupEngineBuilder {
            config,
            key: None,
            secret: None,
            primary: None,
            fallback: None,
            mirrors: Vec::new(),
            replicas: Vec::new(),
            source: None,
            store: None,
            reinit: None,
            audit: None,
            alerts: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    pub fn alerts(&self) -> &Arc<AlertChannel> {
        &self.alerts
    }

    /// Health metrics of every remote replica's resilient client.
    pub fn replica_health(&self) -> Vec<HealthMetrics> {
        self.replicas.health()
    }

    // ── Capture ───────────────────────────────────────────────────────

    /// Assemble the current state, preferring the entity store and falling
    /// back to the state source for each collection the store has empty.
    pub async fn capture_full_state(&self) -> Result<ApplicationStateSnapshot, SafekeepError> {
        let live = self.source.current_state().await;
        let mut state = ApplicationStateSnapshot::empty();
        for c in Collection::ALL {
            let stored = self
                .store
                .load_collection(c)
                .await
                .map_err(|source| SafekeepError::Capture { source })?;
            // An empty array means "not initialised yet"; anything else,
            // including a malformed value, is the store's answer.
            let chosen = match stored.records() {
                Some(records) if records.is_empty() => live.collection(c).clone(),
                _ => stored,
            };
            state = state.with_collection(c, chosen);
        }

        let settings = match self
            .store
            .load_settings()
            .await
            .map_err(|source| SafekeepError::Capture { source })?
        {
            Some(s) if !s.is_null() && s.as_object().map_or(true, |o| !o.is_empty()) => s,
            _ => live.settings().clone(),
        };
        Ok(state.with_settings(settings))
    }

    // ── Full backups ──────────────────────────────────────────────────

    /// Capture, validate, encrypt and persist a full backup.
    ///
    /// An AUTO backup of an invalid state is skipped with `Ok(None)`. MANUAL
    /// and SNAPSHOT backups of an invalid state are kept, with a WARNING.
    /// Any `Err` has already been raised as a CRITICAL alert.
    pub async fn create_full_backup(
        &self,
        kind: BackupKind,
    ) -> Result<Option<BackupRecord>, SafekeepError> {
        let _writer = self.writer.lock().await;
        match self.create_locked(kind).await {
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "backup failed");
                self.audit.audit(
                    "BACKUP_CREATED",
                    json!({ "kind": kind.to_string(), "error": e.to_string() }),
                    AuditStatus::Failure,
                );
                self.alerts
                    .trigger(
                        Severity::Critical,
                        "Critical failure during backup creation",
                        AlertMetadata::BackupFailed {
                            error: e.to_string(),
                        },
                    )
                    .await;
                Err(e)
            }
            ok => ok,
        }
    }

    async fn create_locked(&self, kind: BackupKind) -> Result<Option<BackupRecord>, SafekeepError> {
        let state = self.capture_full_state().await?;
        let validation = validate_full_state(&state).await;
        if !validation.is_valid() {
            if kind == BackupKind::Auto {
                tracing::warn!(errors = validation.errors.len(), "auto backup skipped: state is invalid");
                self.audit.log(
                    LogLevel::Warn,
                    "Auto backup skipped: state validation failed",
                    Some(json!({ "errors": validation.errors })),
                    Some(context::DLP),
                );
                return Ok(None);
            }
            self.alerts
                .trigger(
                    Severity::Warning,
                    format!("{kind} backup captured a state that failed validation"),
                    AlertMetadata::StateInvalid {
                        errors: validation.errors.clone(),
                    },
                )
                .await;
        }

        let bytes = state.to_bytes()?;
        let now = ids::now();
        let mut record = BackupRecord {
            id: ids::timestamped_id("backup", now),
            timestamp: now,
            schema_version: self.config.schema_version.clone(),
            content_hash: content_hash(&bytes),
            kind,
            size_bytes: bytes.len() as u64,
            status: BackupStatus::Pending,
            storage_tiers: BTreeSet::from([StorageTier::Local]),
            compliance: Compliance {
                integrity_checked: false,
                georeplicated: false,
                encrypted: true,
            },
        };
        let blob = Arc::new(self.cipher.encrypt(&bytes)?);
        let data_key = keys::backup_data(&record.id);

        self.primary.put(&data_key, &blob).await.map_err(local)?;
        if let Some(fallback) = &self.fallback {
            if let Err(e) = fallback.put(&data_key, &blob).await {
                self.degraded(&record.id, "fallback", format!("fallback write failed: {e}"));
            }
        }
        record.compliance.integrity_checked = self.verify_primary(&record).await;

        if !self.mirrors.is_empty() {
            for write in self.mirrors.save(&record.id, Arc::clone(&blob)).await {
                if let Err(e) = write.result {
                    self.degraded(&record.id, "mirror", format!("mirror {} write failed: {e}", write.mirror));
                }
            }
            let quorum = self.verify_mirrors(&record.id, &record.content_hash).await;
            if quorum.is_quorate() {
                record.storage_tiers.insert(StorageTier::Mirror);
            } else {
                self.alerts
                    .trigger(
                        Severity::Warning,
                        format!("RAID Shielding Redundancy failed for backup {}", record.id),
                        AlertMetadata::RedundancyDegraded {
                            backup_id: record.id.clone(),
                            verified: quorum.verified,
                            required: quorum.required,
                        },
                    )
                    .await;
            }
        }

        if !self.replicas.is_empty() {
            let mut prospective = record.clone();
            prospective.status = BackupStatus::Integrated;
            prospective.storage_tiers.insert(StorageTier::Remote);
            prospective.compliance.georeplicated = true;

            let reports = self.replicas.replicate(&prospective, Arc::clone(&blob)).await;
            for report in &reports {
                match &report.outcome {
                    ReplicaOutcome::Failed(e) => {
                        self.degraded(
                            &record.id,
                            "remote",
                            format!("replication to {} failed: {e}", report.replica),
                        )
                    }
                    ReplicaOutcome::Skipped => {
                        tracing::debug!(replica = %report.replica, "replica offline, skipped")
                    }
                    ReplicaOutcome::Replicated => {}
                }
            }
            if reports.iter().any(|r| r.outcome == ReplicaOutcome::Replicated) {
                record.storage_tiers.insert(StorageTier::Remote);
                record.compliance.georeplicated = true;
            }
        }

        record.status = BackupStatus::Integrated;
        write_json(self.primary.as_ref(), &keys::backup_meta(&record.id), &record)
            .await
            .map_err(local)?;
        append_catalog(self.primary.as_ref(), &record.id)
            .await
            .map_err(local)?;
        if let Some(fallback) = &self.fallback {
            let mirrored = async {
                write_json(fallback.as_ref(), &keys::backup_meta(&record.id), &record).await?;
                append_catalog(fallback.as_ref(), &record.id).await
            };
            if let Err(e) = mirrored.await {
                self.degraded(&record.id, "fallback", format!("fallback catalog write failed: {e}"));
            }
        }

        self.audit.log(
            LogLevel::Info,
            &format!("Backup {} integrated", record.id),
            Some(json!({
                "id": record.id,
                "hash": record.content_hash,
                "tiers": record.tier_list(),
                "compliance": record.compliance,
            })),
            Some(context::DLP_COMPLIANCE),
        );
        self.audit.audit(
            "BACKUP_CREATED",
            json!({ "id": record.id, "kind": kind.to_string(), "size": record.size_bytes }),
            AuditStatus::Success,
        );
        tracing::info!(backup = %record.id, kind = %kind, tiers = %record.tier_list(), "backup integrated");
        Ok(Some(record))
    }

    /// A best-effort tier failed for backup `id`. Recorded as a DLP warning
    /// so the watchdog and the audit trail see the lost redundancy.
    fn degraded(&self, id: &str, tier: &str, message: String) {
        tracing::warn!(backup = id, tier, "{message}");
        self.audit.log(
            LogLevel::Warn,
            &format!("Redundancy degraded for backup {id}: {message}"),
            Some(json!({ "id": id, "tier": tier })),
            Some(context::DLP),
        );
    }

    /// Read the primary copy back and check it opens to the recorded hash.
    async fn verify_primary(&self, record: &BackupRecord) -> bool {
        match self.primary.get(&keys::backup_data(&record.id)).await {
            Ok(Some(blob)) => self
                .cipher
                .decrypt(&blob)
                .map(|plain| content_hash(&plain) == record.content_hash)
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(backup = %record.id, error = %e, "primary read-back failed");
                false
            }
        }
    }

    async fn verify_mirrors(&self, id: &str, master_hash: &str) -> QuorumReport {
        let report = self
            .mirrors
            .verify(id, master_hash, Arc::clone(&self.cipher))
            .await;
        for failure in &report.failures {
            if let Err(e) = &failure.result {
                self.degraded(id, "mirror", format!("mirror {} copy did not verify: {e}", failure.mirror));
            }
        }
        report
    }

    /// True when at least the configured quorum of mirrors hold a copy of
    /// backup `id` that decrypts and hashes to `master_hash`.
    pub async fn validate_raid_integrity(&self, id: &str, master_hash: &str) -> bool {
        self.verify_mirrors(id, master_hash).await.is_quorate()
    }

    // ── Catalog ───────────────────────────────────────────────────────

    fn local_tiers(&self) -> Vec<(PersistenceTier, &Arc<dyn PersistenceBackend>)> {
        let mut tiers = vec![(PersistenceTier::Local, &self.primary)];
        if let Some(fallback) = &self.fallback {
            tiers.push((PersistenceTier::Fallback, fallback));
        }
        tiers
    }

    /// Every known backup record, newest first. Records present in both the
    /// primary and the fallback catalog appear once.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>, SafekeepError> {
        let mut seen = HashSet::new();
        let mut found: Vec<(usize, BackupRecord)> = Vec::new();
        let mut scanned = 0usize;

        for (tier, backend) in self.local_tiers() {
            let catalog: Vec<String> = match read_json(backend.as_ref(), keys::BACKUP_LIST).await {
                Ok(ids) => ids.unwrap_or_default(),
                Err(source) if tier == PersistenceTier::Local => return Err(local(source)),
                Err(e) => {
                    tracing::warn!(tier = %tier, error = %e, "catalog unreadable");
                    continue;
                }
            };
            for id in catalog {
                scanned += 1;
                if scanned % CATALOG_YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
                if seen.contains(&id) {
                    continue;
                }
                match read_json::<BackupRecord>(backend.as_ref(), &keys::backup_meta(&id)).await {
                    Ok(Some(record)) => {
                        seen.insert(id);
                        found.push((found.len(), record));
                    }
                    Ok(None) => tracing::warn!(tier = %tier, backup = %id, "catalog entry has no metadata"),
                    Err(e) => tracing::warn!(tier = %tier, backup = %id, error = %e, "unreadable backup metadata"),
                }
            }
        }

        found.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }

    /// The stored record for backup `id`, from the primary or the fallback.
    pub async fn backup_record(&self, id: &str) -> Result<Option<BackupRecord>, SafekeepError> {
        let key = keys::backup_meta(id);
        for (tier, backend) in self.local_tiers() {
            match read_json(backend.as_ref(), &key).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(source) if tier == PersistenceTier::Local => return Err(local(source)),
                Err(e) => tracing::warn!(tier = %tier, backup = id, error = %e, "unreadable backup metadata"),
            }
        }
        Ok(None)
    }

    /// Write an updated record to the primary (mandatory) and fallback.
    async fn persist_record(&self, record: &BackupRecord) -> Result<(), SafekeepError> {
        let key = keys::backup_meta(&record.id);
        write_json(self.primary.as_ref(), &key, record)
            .await
            .map_err(local)?;
        if let Some(fallback) = &self.fallback {
            if fallback.get(&key).await.ok().flatten().is_some() {
                if let Err(e) = write_json(fallback.as_ref(), &key, record).await {
                    self.degraded(&record.id, "fallback", format!("fallback metadata update failed: {e}"));
                }
            }
        }
        Ok(())
    }

    /// Whether `blob` decrypts, and hashes to `expected` when one is known.
    fn opens_to(&self, blob: &[u8], expected: Option<&str>) -> bool {
        self.cipher
            .decrypt(blob)
            .is_ok_and(|plain| expected.map_or(true, |hash| content_hash(&plain) == hash))
    }

    /// The encrypted blob of backup `id` from the first tier that has it:
    /// primary, fallback, mirrors, then remote replicas. Mirror and remote
    /// copies are only taken once they open to `expected`; when none does,
    /// the first mirror copy is returned so the caller sees the damage.
    async fn read_blob(&self, id: &str, expected: Option<&str>) -> Option<Vec<u8>> {
        let key = keys::backup_data(id);
        for (tier, backend) in self.local_tiers() {
            match backend.get(&key).await {
                Ok(Some(blob)) => return Some(blob),
                Ok(None) => {}
                Err(e) => tracing::warn!(tier = %tier, backup = id, error = %e, "blob read failed"),
            }
        }
        let intact = |blob: &[u8]| self.opens_to(blob, expected);
        if let Some((mirror, blob)) = self.mirrors.read(id, &intact).await {
            tracing::info!(backup = id, mirror, "blob recovered from mirror");
            return Some(blob);
        }
        if let Some(blob) = self.replicas.fetch_blob(&key, &intact).await {
            tracing::info!(backup = id, "blob recovered from remote replica");
            return Some(blob);
        }
        self.mirrors.read(id, |_| true).await.map(|(_, blob)| blob)
    }

    /// Decrypt and decode backup `id`. `Ok(None)` when no tier holds it.
    pub async fn load_backup(
        &self,
        id: &str,
    ) -> Result<Option<ApplicationStateSnapshot>, SafekeepError> {
        let record = self.backup_record(id).await?;
        let expected = record.as_ref().map(|r| r.content_hash.as_str());
        let Some(blob) = self.read_blob(id, expected).await else {
            return Ok(None);
        };
        let plain = self.cipher.decrypt(&blob).map_err(|e| for_backup(id, e))?;
        if record.is_none() {
            tracing::warn!(backup = id, "no metadata record; content hash not checked");
            self.audit.log(
                LogLevel::Warn,
                &format!("Backup {id} loaded without metadata, hash check skipped"),
                None,
                Some(context::DLP),
            );
        }
        if let Some(record) = record {
            let actual = content_hash(&plain);
            if actual != record.content_hash {
                return Err(SafekeepError::integrity(
                    format!("backup {id}"),
                    IntegrityFailure::HashMismatch {
                        expected: record.content_hash,
                        actual,
                    },
                ));
            }
        }
        Ok(Some(ApplicationStateSnapshot::from_bytes(&plain)?))
    }

    // ── Restore ───────────────────────────────────────────────────────

    /// Load backup `id` and install it. Failures are logged, not returned.
    pub async fn restore_system(&self, id: &str) -> bool {
        let _writer = self.writer.lock().await;
        let state = match self.load_backup(id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::warn!(backup = id, "restore requested for unknown backup");
                return false;
            }
            Err(e) => {
                tracing::error!(backup = id, error = %e, "backup could not be loaded for restore");
                self.audit.audit(
                    "SYSTEM_RESTORE",
                    json!({ "id": id, "error": e.to_string() }),
                    AuditStatus::Failure,
                );
                return false;
            }
        };
        match self.apply_locked(&state).await {
            Ok(()) => {
                self.audit
                    .audit("SYSTEM_RESTORE", json!({ "id": id }), AuditStatus::Success);
                true
            }
            Err(e) => {
                tracing::error!(backup = id, error = %e, "restore failed");
                self.audit.audit(
                    "SYSTEM_RESTORE",
                    json!({ "id": id, "error": e.to_string() }),
                    AuditStatus::Failure,
                );
                false
            }
        }
    }

    /// Replace the entity store's contents with `state`, then signal the
    /// host to reinitialize.
    ///
    /// The store is cleared first and every collection is rewritten in
    /// parallel. The reinit signal fires only after every write succeeded.
    pub async fn apply_state(&self, state: &ApplicationStateSnapshot) -> Result<(), SafekeepError> {
        let _writer = self.writer.lock().await;
        self.apply_locked(state).await
    }

    async fn apply_locked(&self, state: &ApplicationStateSnapshot) -> Result<(), SafekeepError> {
        self.store
            .clear_all()
            .await
            .map_err(|source| SafekeepError::Restore {
                stage: "clear".into(),
                source,
            })?;

        let mut tasks = JoinSet::new();
        for c in Collection::ALL {
            let store = Arc::clone(&self.store);
            let records = state.collection(c).clone();
            tasks.spawn(async move {
                store
                    .save_collection(c, records)
                    .await
                    .map_err(|e| (c.as_str().to_string(), e))
            });
        }
        let store = Arc::clone(&self.store);
        let settings = state.settings().clone();
        tasks.spawn(async move {
            store
                .save_settings(settings)
                .await
                .map_err(|e| ("settings".to_string(), e))
        });

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failed = match joined {
                Ok(Ok(())) => continue,
                Ok(Err((stage, source))) => (stage, source),
                Err(e) => ("join".to_string(), StorageError::Backend(e.to_string())),
            };
            tracing::error!(stage = %failed.0, error = %failed.1, "entity store write failed");
            if first_error.is_none() {
                first_error = Some(SafekeepError::Restore {
                    stage: failed.0,
                    source: failed.1,
                });
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!(records = state.record_count(), "state applied to entity store");
        self.reinit.reinitialize();
        Ok(())
    }

    // ── Verification ──────────────────────────────────────────────────

    /// Re-check every backup's blob against its recorded hash.
    ///
    /// A backup that fails for the first time is marked CORRUPTED and
    /// raises a CRITICAL alert. Yields after every backup.
    pub async fn validate_all_backups(&self) -> Result<VerificationSummary, SafekeepError> {
        let backups = self.list_backups().await?;
        let mut summary = VerificationSummary::default();

        for mut record in backups {
            summary.checked += 1;
            match self.read_blob(&record.id, Some(&record.content_hash)).await {
                None => {
                    self.audit.log(
                        LogLevel::Error,
                        &format!("Backup data missing for ID: {}", record.id),
                        None,
                        Some(context::DLP),
                    );
                    summary.missing.push(record.id.clone());
                }
                Some(blob) => {
                    let reason = match self.cipher.decrypt(&blob) {
                        Ok(plain) => {
                            let actual = content_hash(&plain);
                            (actual != record.content_hash).then(|| {
                                IntegrityFailure::HashMismatch {
                                    expected: record.content_hash.clone(),
                                    actual,
                                }
                                .to_string()
                            })
                        }
                        Err(SafekeepError::Integrity { failure, .. }) => Some(failure.to_string()),
                        Err(e) => Some(e.to_string()),
                    };
                    if let Some(reason) = reason {
                        summary.corrupted.push(record.id.clone());
                        if record.status != BackupStatus::Corrupted {
                            record.status = BackupStatus::Corrupted;
                            if let Err(e) = self.persist_record(&record).await {
                                tracing::error!(backup = %record.id, error = %e, "could not mark backup corrupted");
                            }
                            self.alerts
                                .trigger(
                                    Severity::Critical,
                                    format!("Backup corruption detected for ID: {}", record.id),
                                    AlertMetadata::BackupCorrupted {
                                        backup_id: record.id.clone(),
                                        reason,
                                    },
                                )
                                .await;
                        }
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        self.audit.log(
            LogLevel::Info,
            "Backup verification finished",
            Some(json!({
                "checked": summary.checked,
                "corrupted": summary.corrupted,
                "missing": summary.missing,
            })),
            Some(context::DLP_MONITORING),
        );
        Ok(summary)
    }

    // ── Point-in-time snapshots ───────────────────────────────────────

    /// Capture the current state into the snapshot history. Returns the new
    /// snapshot's id.
    pub async fn create_snapshot(&self, label: Option<&str>) -> Result<String, SafekeepError> {
        let _writer = self.writer.lock().await;
        let state = self.capture_full_state().await?;
        let now = ids::now();
        let snapshot = PointInTimeSnapshot {
            id: ids::timestamped_id("snap", now),
            timestamp: now,
            label: label.map(str::to_string),
            state,
        };
        let id = snapshot.id.clone();
        let evicted = self.snapshots.append(snapshot).await.map_err(local)?;
        if !evicted.is_empty() {
            tracing::debug!(evicted = ?evicted, "oldest snapshots evicted");
        }
        self.audit.audit(
            "PITR_SNAPSHOT_CREATED",
            json!({ "id": id, "label": label }),
            AuditStatus::Success,
        );
        Ok(id)
    }

    /// Retained snapshots, oldest first.
    pub async fn list_snapshots(&self) -> Result<Vec<PointInTimeSnapshot>, SafekeepError> {
        self.snapshots.list().await.map_err(local)
    }

    pub async fn restore_to_point_in_time(&self, id: &str) -> bool {
        let _writer = self.writer.lock().await;
        let snapshot = match self.snapshots.find(id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(snapshot = id, "unknown snapshot");
                return false;
            }
            Err(e) => {
                tracing::error!(snapshot = id, error = %e, "snapshot history unreadable");
                return false;
            }
        };
        match self.apply_locked(&snapshot.state).await {
            Ok(()) => {
                self.audit
                    .audit("PITR_RESTORE", json!({ "id": id }), AuditStatus::Success);
                true
            }
            Err(e) => {
                tracing::error!(snapshot = id, error = %e, "point-in-time restore failed");
                self.audit.audit(
                    "PITR_RESTORE",
                    json!({ "id": id, "error": e.to_string() }),
                    AuditStatus::Failure,
                );
                false
            }
        }
    }

    // ── Reporting ─────────────────────────────────────────────────────

    /// Build the compliance report and store a copy in the primary backend.
    pub async fn generate_compliance_report(&self) -> Result<ComplianceReport, SafekeepError> {
        let backups = self.list_backups().await?;
        let report = ComplianceReport::build(
            &backups,
            &self.audit.entries(),
            self.mirrors.len(),
            self.mirrors.quorum(),
            self.replicas.len(),
            ids::now(),
        );
        let key = keys::report(&ids::unix_millis(report.generated_at).to_string());
        write_json(self.primary.as_ref(), &key, &report)
            .await
            .map_err(local)?;
        self.audit.audit(
            "COMPLIANCE_REPORT_GENERATED",
            json!({ "key": key, "totalBackups": report.total_backups }),
            AuditStatus::Success,
        );
        Ok(report)
    }
}
