use safekeep_core::audit::context;
use safekeep_core::{BackupRecord, BackupStatus, LogEntry};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPosture {
    pub encryption: String,
    pub hashing: String,
    pub key_derivation: String,
    pub redundancy: String,
}

/// Exportable summary of the backup catalog and compliance log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub total_backups: usize,
    pub last_backup: Option<BackupRecord>,
    /// Share of backups still INTEGRATED, in `0.0..=1.0`.
    pub health_score: f64,
    pub compliance_logs: Vec<LogEntry>,
    pub security: SecurityPosture,
}

impl ComplianceReport {
    /// `backups` must be newest first.
    pub fn build(
        backups: &[BackupRecord],
        log: &[LogEntry],
        mirrors: usize,
        quorum: usize,
        replicas: usize,
        generated_at: OffsetDateTime,
    ) -> Self {
        let integrated = backups
            .iter()
            .filter(|b| b.status == BackupStatus::Integrated)
            .count();
        let compliance_logs = log
            .iter()
            .filter(|e| e.has_context(context::DLP_COMPLIANCE) || e.has_context(context::DLP_MONITORING))
            .cloned()
            .collect();

        ComplianceReport {
            generated_at,
            total_backups: backups.len(),
            last_backup: backups.first().cloned(),
            health_score: integrated as f64 / backups.len().max(1) as f64,
            compliance_logs,
            security: SecurityPosture {
                encryption: "ChaCha20-Poly1305".into(),
                hashing: "SHA-256".into(),
                key_derivation: "PBKDF2-HMAC-SHA256".into(),
                redundancy: format!(
                    "local + {mirrors} mirrors ({quorum}-of-{mirrors} quorum) + {replicas} remote replicas"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safekeep_core::{BackupKind, Compliance, LogLevel};

    fn record(id: &str, status: BackupStatus) -> BackupRecord {
        BackupRecord {
            id: id.into(),
            timestamp: safekeep_core::ids::now(),
            schema_version: safekeep_core::SCHEMA_VERSION.into(),
            content_hash: String::new(),
            kind: BackupKind::Auto,
            size_bytes: 0,
            status,
            storage_tiers: Default::default(),
            compliance: Compliance::default(),
        }
    }

    fn entry(ctx: &str) -> LogEntry {
        LogEntry {
            id: ctx.to_lowercase(),
            timestamp: safekeep_core::ids::now(),
            level: LogLevel::Info,
            message: ctx.into(),
            data: None,
            context: Some(ctx.into()),
        }
    }

    #[test]
    fn health_score_and_filtered_logs() {
        let backups = vec![
            record("b3", BackupStatus::Integrated),
            record("b2", BackupStatus::Corrupted),
            record("b1", BackupStatus::Integrated),
            record("b0", BackupStatus::Integrated),
        ];
        let log = vec![
            entry(context::DLP_COMPLIANCE),
            entry(context::AUDIT),
            entry(context::DLP_MONITORING),
        ];
        let r = ComplianceReport::build(&backups, &log, 3, 2, 1, safekeep_core::ids::now());
        assert_eq!(r.total_backups, 4);
        assert_eq!(r.health_score, 0.75);
        assert_eq!(r.last_backup.map(|b| b.id).as_deref(), Some("b3"));
        assert_eq!(r.compliance_logs.len(), 2);
        assert!(r.security.redundancy.contains("2-of-3"));
    }

    #[test]
    fn empty_catalog_scores_zero() {
        let r = ComplianceReport::build(&[], &[], 0, 2, 0, safekeep_core::ids::now());
        assert_eq!(r.health_score, 0.0);
        assert!(r.last_backup.is_none());
    }
}
