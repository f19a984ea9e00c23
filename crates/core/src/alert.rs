//! Severity-tagged alerts for data-integrity and persistence problems.
//!
//! The channel keeps a ledger of every alert (newest first), logs each one
//! to the audit sink, pushes CRITICAL alerts to an external [`Notifier`],
//! and calls subscribed listeners after every change.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::audit::{context, AuditSink, LogLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        })
    }
}

/// What an alert is about, with the details that kind of alert carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertMetadata {
    None,
    /// The primary backup path failed.
    BackupFailed { error: String },
    /// A stored backup failed integrity verification.
    BackupCorrupted { backup_id: String, reason: String },
    /// Fewer mirrors than the quorum hold a verified copy.
    RedundancyDegraded {
        backup_id: String,
        verified: usize,
        required: usize,
    },
    /// The live state failed validation.
    StateInvalid { errors: Vec<String> },
    /// Auto-recovery finished, successfully or not.
    Recovery { backup_id: Option<String> },
    /// The watchdog's view of overall stability changed.
    Stability { recent_errors: usize },
}

impl AlertMetadata {
    fn to_value(&self) -> Option<Value> {
        match self {
            AlertMetadata::None => None,
            other => serde_json::to_value(other).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub resolved: bool,
    pub metadata: AlertMetadata,
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Out-of-band delivery for CRITICAL alerts (webhook, pager, e-mail).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Notifier that only writes the alert to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::error!(
            alert_id = %alert.id,
            severity = %alert.severity,
            "external alert: {}",
            alert.message
        );
        Ok(())
    }
}

/// Handle returned by [`AlertChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&[Alert]) + Send + Sync>;

pub struct AlertChannel {
    audit: Arc<dyn AuditSink>,
    notifier: Option<Arc<dyn Notifier>>,
    ledger: Mutex<VecDeque<Alert>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl AlertChannel {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        AlertChannel {
            audit,
            notifier: None,
            ledger: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record a new alert, log it, and notify listeners.
    ///
    /// CRITICAL alerts are also sent to the external notifier. A notifier
    /// failure is logged and otherwise ignored: raising an alert never fails.
    pub async fn trigger(
        &self,
        severity: Severity,
        message: impl Into<String>,
        metadata: AlertMetadata,
    ) -> Alert {
        let alert = Alert {
            id: crate::ids::short_id(),
            severity,
            message: message.into(),
            timestamp: crate::ids::now(),
            resolved: false,
            metadata,
        };
        lock(&self.ledger).push_front(alert.clone());

        let data = alert.metadata.to_value();
        match severity {
            Severity::Critical => {
                self.audit.log(
                    LogLevel::Error,
                    &format!("DLP CRITICAL ALERT: {}", alert.message),
                    data,
                    Some(context::DLP),
                );
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.notify(&alert).await {
                        self.audit.log(
                            LogLevel::Warn,
                            &format!("external alert delivery failed: {e}"),
                            None,
                            Some(context::DLP),
                        );
                    }
                }
            }
            Severity::Warning => self.audit.log(
                LogLevel::Warn,
                &format!("DLP WARNING: {}", alert.message),
                data,
                Some(context::DLP),
            ),
            Severity::Info => self.audit.log(
                LogLevel::Info,
                &format!("DLP INFO: {}", alert.message),
                data,
                Some(context::DLP),
            ),
        }

        self.notify_listeners();
        alert
    }

    /// Mark an alert resolved. Returns false for an unknown id.
    pub fn resolve(&self, id: &str) -> bool {
        let found = {
            let mut ledger = lock(&self.ledger);
            match ledger.iter_mut().find(|a| a.id == id) {
                Some(alert) => {
                    alert.resolved = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.notify_listeners();
        }
        found
    }

    /// Unresolved alerts, newest first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        lock(&self.ledger)
            .iter()
            .filter(|a| !a.resolved)
            .cloned()
            .collect()
    }

    /// Every alert, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.ledger).iter().cloned().collect()
    }

    /// Register a listener called with the full ledger after every change.
    /// Listeners must not subscribe or unsubscribe from inside the callback.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&[Alert]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    fn notify_listeners(&self) {
        let snapshot: Vec<Alert> = lock(&self.ledger).iter().cloned().collect();
        for (_, listener) in lock(&self.listeners).iter() {
            listener(&snapshot);
        }
    }
}
