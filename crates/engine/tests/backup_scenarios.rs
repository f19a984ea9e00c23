//! End-to-end backup engine scenarios over in-memory backends.

mod common;

use std::sync::Arc;

use common::{broken_restaurant, categories, dishes, raid_rig, restaurant, rig};
use safekeep_core::audit::context;
use safekeep_core::validate::validate_menu;
use safekeep_core::{
    AlertMetadata, AuditSink, BackupKind, BackupStatus, Collection, EntityStore,
    IntegrityFailure, LogEntry, LogLevel, SafekeepError, Severity, StorageTier,
};
use safekeep_engine::{BackupEngine, EngineConfig, SimulatedReplica};
use safekeep_storage::{keys, MemoryBackend, PersistenceBackend};
use serde_json::Value;

fn as_vec(v: &Value) -> Vec<Value> {
    v.as_array().cloned().unwrap_or_default()
}

fn dlp_warnings(entries: Vec<LogEntry>) -> Vec<String> {
    entries
        .into_iter()
        .filter(|e| e.level == LogLevel::Warn && e.context.as_deref() == Some(context::DLP))
        .map(|e| e.message)
        .collect()
}

// ──────────────────────────────────────────────
// Full backups
// ──────────────────────────────────────────────

#[tokio::test]
async fn manual_backup_round_trips_categories_and_dishes() {
    let rig = raid_rig().build();
    let record = rig
        .engine
        .create_full_backup(BackupKind::Manual)
        .await
        .unwrap()
        .expect("manual backups are never skipped");

    let listed = rig.engine.list_backups().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].status, BackupStatus::Integrated);
    assert!(listed[0].has_tier(StorageTier::Local));
    assert!(listed[0].has_tier(StorageTier::Mirror));
    assert!(listed[0].compliance.encrypted);
    assert!(listed[0].compliance.integrity_checked);

    let state = rig.engine.load_backup(&record.id).await.unwrap().unwrap();
    assert_eq!(as_vec(state.collection(Collection::Categories).as_value()), categories());
    assert_eq!(as_vec(state.collection(Collection::Menu).as_value()), dishes());
}

#[tokio::test]
async fn negative_price_blocks_auto_backup_only() {
    let state = broken_restaurant("Chez Broken");
    let menu = validate_menu(state.collection(Collection::Menu)).await;
    assert!(!menu.is_valid());
    assert!(menu.errors.iter().any(|e| e.contains("dish-2")));

    let rig = rig().state(state).build();
    assert!(rig
        .engine
        .create_full_backup(BackupKind::Auto)
        .await
        .unwrap()
        .is_none());
    assert!(rig.engine.list_backups().await.unwrap().is_empty());

    // A manual backup of the same state is kept for forensics, with a warning.
    let forensic = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap();
    assert!(forensic.is_some());
    let alerts = rig.engine.alerts().alerts();
    assert!(matches!(alerts[0].metadata, AlertMetadata::StateInvalid { .. }));
    assert_eq!(alerts[0].severity, Severity::Warning);
}

#[tokio::test]
async fn newest_backup_lists_first() {
    let rig = rig().build();
    let first = rig.engine.create_full_backup(BackupKind::Auto).await.unwrap().unwrap();
    let second = rig.engine.create_full_backup(BackupKind::Snapshot).await.unwrap().unwrap();
    let ids: Vec<String> = rig
        .engine
        .list_backups()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn key_derived_from_secret_opens_its_own_backups() {
    let primary = Arc::new(MemoryBackend::new("primary"));
    let store = Arc::new(safekeep_core::MemoryEntityStore::new());
    store
        .save_collection(Collection::Categories, categories().into())
        .await
        .unwrap();
    store
        .save_settings(serde_json::json!({"restaurantName": "Derived"}))
        .await
        .unwrap();
    let engine = BackupEngine::builder(EngineConfig::default())
        .secret("correct horse battery staple")
        .primary(primary.clone())
        .entity_store(store)
        .build()
        .unwrap();
    let record = engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    let state = engine.load_backup(&record.id).await.unwrap().unwrap();
    assert_eq!(state.settings()["restaurantName"], "Derived");
}

// ──────────────────────────────────────────────
// Integrity
// ──────────────────────────────────────────────

#[tokio::test]
async fn tampered_blob_is_an_integrity_error() {
    let rig = rig().build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();

    let key = keys::backup_data(&record.id);
    let mut blob = rig.primary.get(&key).await.unwrap().unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    rig.primary.put(&key, &blob).await.unwrap();

    let err = rig.engine.load_backup(&record.id).await.unwrap_err();
    assert!(matches!(
        err,
        SafekeepError::Integrity {
            failure: IntegrityFailure::AuthenticationFailed,
            ..
        }
    ));
    assert!(!rig.engine.restore_system(&record.id).await);
    assert_eq!(rig.reinit.count(), 0);
}

#[tokio::test]
async fn validate_all_marks_corruption_once() {
    let rig = rig().build();
    let good = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    let bad = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    rig.primary
        .put(&keys::backup_data(&bad.id), b"not a sealed blob at all, definitely")
        .await
        .unwrap();

    let summary = rig.engine.validate_all_backups().await.unwrap();
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.corrupted, vec![bad.id.clone()]);

    let records = rig.engine.list_backups().await.unwrap();
    let status = |id: &str| records.iter().find(|r| r.id == id).map(|r| r.status);
    assert_eq!(status(&bad.id), Some(BackupStatus::Corrupted));
    assert_eq!(status(&good.id), Some(BackupStatus::Integrated));

    let corruption_alerts = || {
        rig.engine
            .alerts()
            .alerts()
            .into_iter()
            .filter(|a| a.message == format!("Backup corruption detected for ID: {}", bad.id))
            .count()
    };
    assert_eq!(corruption_alerts(), 1);
    rig.engine.validate_all_backups().await.unwrap();
    assert_eq!(corruption_alerts(), 1);
}

// ──────────────────────────────────────────────
// Redundancy tiers
// ──────────────────────────────────────────────

#[tokio::test]
async fn mirror_quorum_is_two_of_three() {
    let rig = raid_rig().build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    let key = keys::backup_data(&record.id);
    assert!(rig.engine.validate_raid_integrity(&record.id, &record.content_hash).await);

    rig.mirrors[0].put(&key, b"scrambled mirror copy, not sealed").await.unwrap();
    assert!(rig.engine.validate_raid_integrity(&record.id, &record.content_hash).await);

    rig.mirrors[2].delete(&key).await.unwrap();
    assert!(!rig.engine.validate_raid_integrity(&record.id, &record.content_hash).await);
}

#[tokio::test]
async fn failed_mirrors_degrade_tiers_without_failing_the_backup() {
    let rig = rig()
        .mirror(MemoryBackend::new("ok"))
        .mirror(MemoryBackend::new("full1").with_quota(16))
        .mirror(MemoryBackend::new("full2").with_quota(16))
        .build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    assert!(record.has_tier(StorageTier::Local));
    assert!(!record.has_tier(StorageTier::Mirror));

    let alert = &rig.engine.alerts().alerts()[0];
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(
        alert.message,
        format!("RAID Shielding Redundancy failed for backup {}", record.id)
    );
    assert!(matches!(
        alert.metadata,
        AlertMetadata::RedundancyDegraded {
            verified: 1,
            required: 2,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_tiers_are_written_to_the_audit_log() {
    let cloud = Arc::new(SimulatedReplica::new("cloud"));
    cloud.fail_next(100);
    let rig = rig()
        .mirror(MemoryBackend::new("ok1"))
        .mirror(MemoryBackend::new("ok2"))
        .mirror(MemoryBackend::new("full").with_quota(16))
        .replica(cloud.clone())
        .build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    assert!(record.has_tier(StorageTier::Mirror));
    assert!(!record.has_tier(StorageTier::Remote));

    let warnings = dlp_warnings(rig.audit.entries());
    assert!(warnings
        .iter()
        .any(|m| m.contains(&record.id) && m.contains("mirror 3 write failed")));
    assert!(warnings
        .iter()
        .any(|m| m.contains(&record.id) && m.contains("replication to cloud failed")));
}

#[tokio::test]
async fn damaged_first_mirror_does_not_mask_intact_copies() {
    let rig = raid_rig().build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();

    let data = keys::backup_data(&record.id);
    rig.primary.delete(&data).await.unwrap();
    rig.fallback.delete(&data).await.unwrap();
    rig.mirrors[0]
        .put(&data, b"bit rot on the first mirror, not a sealed blob")
        .await
        .unwrap();

    let state = rig.engine.load_backup(&record.id).await.unwrap().unwrap();
    assert_eq!(as_vec(state.collection(Collection::Menu).as_value()), dishes());

    let summary = rig.engine.validate_all_backups().await.unwrap();
    assert_eq!(summary.checked, 1);
    assert!(summary.corrupted.is_empty());
    assert!(summary.missing.is_empty());
}

#[tokio::test]
async fn load_without_metadata_records_the_skipped_hash_check() {
    let rig = rig().build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    let meta = keys::backup_meta(&record.id);
    rig.primary.delete(&meta).await.unwrap();
    rig.fallback.delete(&meta).await.unwrap();

    let state = rig.engine.load_backup(&record.id).await.unwrap().unwrap();
    assert_eq!(state.collection(Collection::Menu).len(), 3);
    assert!(dlp_warnings(rig.audit.entries())
        .iter()
        .any(|m| m == &format!("Backup {} loaded without metadata, hash check skipped", record.id)));
}

#[tokio::test]
async fn fallback_and_remote_serve_reads_when_primary_loses_data() {
    let cloud = Arc::new(SimulatedReplica::new("cloud"));
    let rig = rig().replica(cloud.clone()).build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    assert!(record.has_tier(StorageTier::Remote));
    assert!(record.compliance.georeplicated);
    assert_eq!(
        cloud.record(&record.id).map(|r| r.status),
        Some(BackupStatus::Integrated)
    );

    let data = keys::backup_data(&record.id);
    rig.primary.delete(&data).await.unwrap();
    rig.primary.delete(&keys::backup_meta(&record.id)).await.unwrap();
    assert!(rig.engine.load_backup(&record.id).await.unwrap().is_some());

    rig.fallback.delete(&data).await.unwrap();
    let state = rig.engine.load_backup(&record.id).await.unwrap().unwrap();
    assert_eq!(state.collection(Collection::Menu).len(), 3);
    assert_eq!(rig.engine.list_backups().await.unwrap().len(), 1);
}

#[tokio::test]
async fn offline_replica_leaves_remote_tier_off() {
    let cloud = Arc::new(SimulatedReplica::new("cloud"));
    cloud.set_connected(false);
    let rig = rig().replica(cloud.clone()).build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    assert!(!record.has_tier(StorageTier::Remote));
    assert!(!record.compliance.georeplicated);
    assert_eq!(cloud.blob_count(), 0);
}

// ──────────────────────────────────────────────
// Restore, snapshots, report
// ──────────────────────────────────────────────

#[tokio::test]
async fn restore_rewrites_store_and_signals_reinit() {
    let rig = rig().build();
    let record = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    assert!(rig.engine.restore_system(&record.id).await);
    assert_eq!(rig.reinit.count(), 1);
    let restored = rig.store.snapshot();
    assert_eq!(as_vec(restored.collection(Collection::Menu).as_value()), dishes());
    assert_eq!(restored.settings()["restaurantName"], "Chez Test");
}

#[tokio::test]
async fn eleventh_snapshot_evicts_the_oldest() {
    let rig = rig().build();
    let mut ids = Vec::new();
    for n in 0..11 {
        ids.push(rig.engine.create_snapshot(Some(&format!("s{n}"))).await.unwrap());
    }
    let kept: Vec<String> = rig
        .engine
        .list_snapshots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(kept.len(), 10);
    assert_eq!(kept, ids[1..].to_vec());
    assert!(!rig.engine.restore_to_point_in_time(&ids[0]).await);
}

#[tokio::test]
async fn rewind_installs_the_snapshot_state() {
    let rig = rig().build();
    let id = rig.engine.create_snapshot(Some("before service")).await.unwrap();
    rig.source.replace(restaurant("Somewhere Else"));

    assert!(rig.engine.restore_to_point_in_time(&id).await);
    assert_eq!(rig.store.snapshot().settings()["restaurantName"], "Chez Test");
    assert_eq!(rig.reinit.count(), 1);
}

#[tokio::test]
async fn compliance_report_is_scored_and_stored() {
    let rig = rig().build();
    rig.engine.create_full_backup(BackupKind::Manual).await.unwrap();
    let bad = rig.engine.create_full_backup(BackupKind::Manual).await.unwrap().unwrap();
    rig.primary.delete(&keys::backup_data(&bad.id)).await.unwrap();
    rig.fallback.put(&keys::backup_data(&bad.id), b"zz").await.unwrap();
    rig.engine.validate_all_backups().await.unwrap();

    let report = rig.engine.generate_compliance_report().await.unwrap();
    assert_eq!(report.total_backups, 2);
    assert_eq!(report.health_score, 0.5);
    assert_eq!(report.last_backup.map(|b| b.id), Some(bad.id));
    assert!(!report.compliance_logs.is_empty());

    let stored = rig.primary.list_keys(keys::REPORT_PREFIX).await.unwrap();
    assert_eq!(stored.len(), 1);
}
