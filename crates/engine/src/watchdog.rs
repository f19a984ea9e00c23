//! Periodic health supervision and auto-recovery.
//!
//! Each cycle checks the live state (recovering from the newest valid
//! backup when it is broken), takes an AUTO backup, re-verifies every
//! stored backup, and finally judges overall stability from the recent
//! error log.

use std::cmp::Reverse;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use safekeep_core::audit::context;
use safekeep_core::{
    validate_full_state, AlertMetadata, AuditSink, AuditStatus, BackupKind, BackupStatus,
    LogEntry, LogLevel, SafekeepError, Severity, ValidationResult,
};
use serde::Serialize;
use serde_json::json;
use tokio::time::MissedTickBehavior;

use crate::backup::{BackupEngine, VerificationSummary};
use crate::config::WatchdogConfig;

// ──────────────────────────────────────────────
// Remediation
// ──────────────────────────────────────────────

/// A strategy for handling one logged error during critical-error
/// resolution. Returns whether the error counts as resolved.
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn remediate(&self, entry: &LogEntry) -> bool;
}

/// Marks the entry acknowledged in the audit log and nothing else.
pub struct AcknowledgeRemediation {
    audit: Arc<dyn AuditSink>,
}

impl AcknowledgeRemediation {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        AcknowledgeRemediation { audit }
    }
}

#[async_trait]
impl Remediation for AcknowledgeRemediation {
    async fn remediate(&self, entry: &LogEntry) -> bool {
        self.audit.acknowledge(&entry.id)
    }
}

/// Resolution priority of a log entry: the higher of its level's and its
/// context's priority.
pub fn priority(entry: &LogEntry) -> u8 {
    let by_level = match entry.level {
        LogLevel::Critical => 5,
        LogLevel::Error => 4,
        LogLevel::Warn => 2,
        LogLevel::Info => 1,
        LogLevel::Debug => 0,
    };
    let by_context = match entry.context.as_deref() {
        Some(c) if c.starts_with(context::DLP) || c == context::HEALTH => 5,
        Some(context::SECURITY) => 4,
        Some(context::AUTH) => 3,
        _ => 0,
    };
    by_level.max(by_context)
}

// ──────────────────────────────────────────────
// Reports
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityReport {
    pub is_stable: bool,
    pub message: String,
    pub recent_errors: usize,
}

/// What one watchdog cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub healthy: bool,
    /// Id of the AUTO backup taken, if the state was valid enough to take one.
    pub backup: Option<String>,
    pub verification: Option<VerificationSummary>,
    pub stability: Option<StabilityReport>,
    pub error: Option<String>,
}

struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ──────────────────────────────────────────────
// Watchdog
// ──────────────────────────────────────────────

pub struct Watchdog {
    engine: Arc<BackupEngine>,
    config: WatchdogConfig,
    remediation: Arc<dyn Remediation>,
    in_progress: AtomicBool,
    stable: AtomicBool,
}

impl Watchdog {
    pub fn new(engine: Arc<BackupEngine>) -> Self {
        let config = engine.config().watchdog.clone();
        let remediation = Arc::new(AcknowledgeRemediation::new(Arc::clone(engine.audit())));
        Watchdog {
            engine,
            config,
            remediation,
            in_progress: AtomicBool::new(false),
            stable: AtomicBool::new(true),
        }
    }

    pub fn with_remediation(mut self, remediation: Arc<dyn Remediation>) -> Self {
        self.remediation = remediation;
        self
    }

    pub fn engine(&self) -> &Arc<BackupEngine> {
        &self.engine
    }

    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::SeqCst)
    }

    async fn check_state(&self) -> ValidationResult {
        match self.engine.capture_full_state().await {
            Ok(state) => validate_full_state(&state).await,
            Err(e) => {
                let mut result = ValidationResult::default();
                result.error(e.to_string());
                result
            }
        }
    }

    /// Validate the live state without attempting recovery.
    pub async fn probe_health(&self) -> bool {
        self.check_state().await.is_valid()
    }

    /// Validate the live state; when it is invalid raise a CRITICAL alert
    /// and attempt auto-recovery. Returns whether the state is healthy
    /// afterwards.
    pub async fn health_check(&self) -> bool {
        let result = self.check_state().await;
        if result.is_valid() {
            return true;
        }
        tracing::error!(errors = result.errors.len(), "health check failed");
        self.engine.audit().log(
            LogLevel::Error,
            "Health check failed",
            Some(json!({ "errors": result.errors })),
            Some(context::HEALTH),
        );
        self.engine
            .alerts()
            .trigger(
                Severity::Critical,
                "Data corruption detected! Starting auto-recovery...",
                AlertMetadata::StateInvalid {
                    errors: result.errors,
                },
            )
            .await;
        self.auto_recover().await
    }

    /// Restore the newest backup whose state validates. Falls through to
    /// critical-error resolution when none does.
    pub async fn auto_recover(&self) -> bool {
        let backups = match self.engine.list_backups().await {
            Ok(backups) => backups,
            Err(e) => {
                tracing::error!(error = %e, "backup catalog unreadable during recovery");
                Vec::new()
            }
        };

        for record in backups {
            if record.status == BackupStatus::Corrupted {
                continue;
            }
            let state = match self.engine.load_backup(&record.id).await {
                Ok(Some(state)) => state,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(backup = %record.id, error = %e, "backup unusable for recovery");
                    continue;
                }
            };
            if !validate_full_state(&state).await.is_valid() {
                tracing::debug!(backup = %record.id, "backup state is invalid, trying an older one");
                continue;
            }
            if self.engine.restore_system(&record.id).await {
                self.engine
                    .alerts()
                    .trigger(
                        Severity::Info,
                        format!("Auto-recovery successful from backup {}", record.id),
                        AlertMetadata::Recovery {
                            backup_id: Some(record.id.clone()),
                        },
                    )
                    .await;
                return true;
            }
        }

        tracing::error!("no valid backup available for auto-recovery");
        let resolved = self.resolve_critical_errors().await;
        if !resolved {
            self.engine
                .alerts()
                .trigger(
                    Severity::Critical,
                    "Auto-recovery failed: no valid backup found",
                    AlertMetadata::Recovery { backup_id: None },
                )
                .await;
        }
        resolved
    }

    /// Work through recent errors by priority, re-probing health after each
    /// pass. Stops once the state is healthy, once a pass resolves nothing,
    /// or after the configured number of passes.
    pub async fn resolve_critical_errors(&self) -> bool {
        let audit = self.engine.audit();
        audit.audit(
            "CRITICAL_ERROR_RESOLUTION_STARTED",
            json!({ "maxIterations": self.config.max_resolution_iterations }),
            AuditStatus::Pending,
        );

        let mut resolved_total = 0usize;
        let mut healthy = false;
        for iteration in 1..=self.config.max_resolution_iterations {
            let mut errors = audit.recent_errors(self.config.recent_error_limit);
            // Stable sort: equal priorities stay newest first.
            errors.sort_by_key(|e| Reverse(priority(e)));

            let mut resolved = 0usize;
            for entry in &errors {
                let ok = self.remediation.remediate(entry).await;
                audit.audit(
                    "ERROR_RESOLUTION_ATTEMPT",
                    json!({
                        "iteration": iteration,
                        "entry": entry.id,
                        "priority": priority(entry),
                        "message": entry.message,
                    }),
                    if ok {
                        AuditStatus::Success
                    } else {
                        AuditStatus::Failure
                    },
                );
                if ok {
                    resolved += 1;
                }
            }
            resolved_total += resolved;

            healthy = self.probe_health().await;
            if healthy {
                audit.audit(
                    "CRITICAL_ERROR_RESOLUTION_COMPLETED",
                    json!({ "iteration": iteration }),
                    AuditStatus::Success,
                );
                break;
            }
            audit.audit(
                "CRITICAL_ERROR_RESOLUTION_VALIDATION_FAILED",
                json!({ "iteration": iteration, "resolved": resolved }),
                AuditStatus::Failure,
            );
            if resolved == 0 {
                break;
            }
        }

        audit.audit(
            "CRITICAL_ERROR_RESOLUTION_FINAL_STATUS",
            json!({ "resolved": resolved_total, "healthy": healthy }),
            if healthy {
                AuditStatus::Success
            } else {
                AuditStatus::Failure
            },
        );
        healthy
    }

    /// Health check plus a look at the most recent unacknowledged errors.
    pub async fn perform_stability_validation(&self) -> StabilityReport {
        let healthy = self.health_check().await;
        let recent_errors = self
            .engine
            .audit()
            .recent_errors(self.config.stability_error_window)
            .len();
        let (is_stable, message) = if !healthy {
            (false, "state validation failed".to_string())
        } else if recent_errors > 0 {
            (false, format!("{recent_errors} unresolved errors in the recent log"))
        } else {
            (true, "system stable".to_string())
        };
        StabilityReport {
            is_stable,
            message,
            recent_errors,
        }
    }

    async fn transition(&self, report: &StabilityReport) {
        let was_stable = self.stable.swap(report.is_stable, Ordering::SeqCst);
        let alert = match (was_stable, report.is_stable) {
            (false, true) => Some((Severity::Info, "system recovered and stable".to_string())),
            (true, false) => Some((Severity::Warning, report.message.clone())),
            _ => None,
        };
        if let Some((severity, message)) = alert {
            self.engine
                .alerts()
                .trigger(
                    severity,
                    message,
                    AlertMetadata::Stability {
                        recent_errors: report.recent_errors,
                    },
                )
                .await;
        }
    }

    /// Run one full cycle. Returns `None` without doing anything when the
    /// previous cycle is still in progress.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous watchdog cycle still running, skipping");
            return None;
        }
        let _flag = InProgress(&self.in_progress);
        Some(self.cycle().await)
    }

    async fn cycle(&self) -> CycleReport {
        let healthy = self.health_check().await;
        let outcome: Result<_, SafekeepError> = async {
            let backup = self
                .engine
                .create_full_backup(BackupKind::Auto)
                .await?
                .map(|record| record.id);
            let verification = self.engine.validate_all_backups().await?;
            Ok((backup, verification))
        }
        .await;

        match outcome {
            Ok((backup, verification)) => {
                let stability = self.perform_stability_validation().await;
                self.transition(&stability).await;
                tracing::info!(
                    healthy,
                    backup = backup.as_deref().unwrap_or("skipped"),
                    corrupted = verification.corrupted.len(),
                    stable = stability.is_stable,
                    "watchdog cycle finished"
                );
                CycleReport {
                    healthy,
                    backup,
                    verification: Some(verification),
                    stability: Some(stability),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "watchdog cycle failed");
                self.stable.store(false, Ordering::SeqCst);
                self.engine
                    .alerts()
                    .trigger(
                        Severity::Critical,
                        "auto-backup failed during scheduled interval",
                        AlertMetadata::BackupFailed {
                            error: e.to_string(),
                        },
                    )
                    .await;
                CycleReport {
                    healthy,
                    backup: None,
                    verification: None,
                    stability: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run a cycle every configured interval, starting immediately, until
    /// `shutdown` completes.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!(interval_secs = self.config.interval_secs, "watchdog started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
        tracing::info!("watchdog stopped");
    }
}
