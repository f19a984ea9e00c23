//! The structured audit log.
//!
//! Every entry is also emitted as a `tracing` event, so operators see it on
//! the console while the watchdog reads the same entries back through
//! [`AuditSink::recent_errors`].

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Well-known context tags.
pub mod context {
    pub const AUDIT: &str = "AUDIT";
    pub const SECURITY: &str = "SECURITY";
    pub const AUTH: &str = "AUTH";
    pub const DLP: &str = "DLP";
    pub const DLP_COMPLIANCE: &str = "DLP_COMPLIANCE";
    pub const DLP_MONITORING: &str = "DLP_MONITORING";
    pub const HEALTH: &str = "HEALTH";
    pub const SYNC: &str = "SYNC";
}

/// Entries kept by [`MemoryAuditLog`] before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
    Pending,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failure => "FAILURE",
            AuditStatus::Pending => "PENDING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl LogEntry {
    pub fn has_context(&self, ctx: &str) -> bool {
        self.context.as_deref() == Some(ctx)
    }

    /// Error-level entries, plus security warnings.
    pub fn is_error_like(&self) -> bool {
        self.level >= LogLevel::Error
            || (self.level >= LogLevel::Warn && self.has_context(context::SECURITY))
    }
}

/// Where the state-protection subsystem records what it did.
pub trait AuditSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, data: Option<Value>, context: Option<&str>);

    /// Record an audited operation with its outcome.
    fn audit(&self, operation: &str, details: Value, status: AuditStatus) {
        self.log(
            LogLevel::Info,
            &format!("Audit: {operation} - {status}"),
            Some(details),
            Some(context::AUDIT),
        );
    }

    fn security(&self, message: &str, details: Option<Value>) {
        self.log(
            LogLevel::Warn,
            &format!("SECURITY: {message}"),
            details,
            Some(context::SECURITY),
        );
    }

    /// Up to `limit` unacknowledged error-like entries, newest first.
    fn recent_errors(&self, limit: usize) -> Vec<LogEntry>;

    /// Mark an entry as handled so it no longer shows in `recent_errors`.
    fn acknowledge(&self, id: &str) -> bool;

    /// Every retained entry, oldest first.
    fn entries(&self) -> Vec<LogEntry>;
}

/// A bounded in-memory audit log.
pub struct MemoryAuditLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<LogEntry>,
    acknowledged: HashSet<String>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        MemoryAuditLog::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryAuditLog {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.acknowledged.clear();
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        MemoryAuditLog::new()
    }
}

fn emit(level: LogLevel, message: &str, data: Option<&Value>, context: Option<&str>) {
    let context = context.unwrap_or("-");
    let data = data.map(Value::to_string).unwrap_or_default();
    match level {
        LogLevel::Debug => tracing::debug!(context = %context, data = %data, "{message}"),
        LogLevel::Info => tracing::info!(context = %context, data = %data, "{message}"),
        LogLevel::Warn => tracing::warn!(context = %context, data = %data, "{message}"),
        LogLevel::Error | LogLevel::Critical => {
            tracing::error!(context = %context, data = %data, "{message}")
        }
    }
}

impl AuditSink for MemoryAuditLog {
    fn log(&self, level: LogLevel, message: &str, data: Option<Value>, context: Option<&str>) {
        emit(level, message, data.as_ref(), context);
        let entry = LogEntry {
            id: crate::ids::short_id(),
            timestamp: crate::ids::now(),
            level,
            message: message.to_string(),
            data,
            context: context.map(str::to_string),
        };
        let mut inner = self.lock();
        inner.entries.push_back(entry);
        while inner.entries.len() > self.capacity {
            if let Some(dropped) = inner.entries.pop_front() {
                inner.acknowledged.remove(&dropped.id);
            }
        }
    }

    fn recent_errors(&self, limit: usize) -> Vec<LogEntry> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .rev()
            .filter(|e| e.is_error_like() && !inner.acknowledged.contains(&e.id))
            .take(limit)
            .cloned()
            .collect()
    }

    fn acknowledge(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if inner.entries.iter().any(|e| e.id == id) {
            inner.acknowledged.insert(id.to_string())
        } else {
            false
        }
    }

    fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn capacity_drops_oldest() {
        let log = MemoryAuditLog::with_capacity(3);
        for i in 0..5 {
            log.log(LogLevel::Info, &format!("m{i}"), None, None);
        }
        let msgs: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(msgs, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn audit_uses_audit_context() {
        let log = MemoryAuditLog::new();
        log.audit("BACKUP_CREATED", json!({ "id": "b1" }), AuditStatus::Success);
        let entry = &log.entries()[0];
        assert_eq!(entry.message, "Audit: BACKUP_CREATED - SUCCESS");
        assert_eq!(entry.level, LogLevel::Info);
        assert!(entry.has_context(context::AUDIT));
    }

    #[test]
    fn recent_errors_are_newest_first_and_limited() {
        let log = MemoryAuditLog::new();
        log.log(LogLevel::Error, "first", None, None);
        log.log(LogLevel::Info, "noise", None, Some(context::DLP));
        log.log(LogLevel::Critical, "second", None, None);
        log.security("tampering suspected", None);
        log.log(LogLevel::Warn, "plain warning", None, None);

        let errs: Vec<_> = log.recent_errors(10).into_iter().map(|e| e.message).collect();
        assert_eq!(errs, vec!["SECURITY: tampering suspected", "second", "first"]);
        assert_eq!(log.recent_errors(1).len(), 1);
    }

    #[test]
    fn acknowledged_errors_are_hidden() {
        let log = MemoryAuditLog::new();
        log.log(LogLevel::Error, "boom", None, None);
        let id = log.recent_errors(1)[0].id.clone();
        assert!(log.acknowledge(&id));
        assert!(log.recent_errors(10).is_empty());
        assert!(!log.acknowledge("no-such-entry"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn entry_wire_shape() {
        let log = MemoryAuditLog::new();
        log.log(LogLevel::Warn, "careful", Some(json!({ "k": 1 })), Some("SYNC"));
        let v = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(v["level"], json!("warn"));
        assert_eq!(v["context"], json!("SYNC"));
        assert_eq!(v["data"]["k"], json!(1));
    }
}
