use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use super::breaker::CircuitState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Retrying,
    Success,
    Error,
}

/// Outcome of the most recent remote operation on one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub status: SyncState,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Retries spent by the most recent call.
    pub retries: u32,
    pub error_message: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            status: SyncState::Idle,
            last_success_at: None,
            last_error_at: None,
            retries: 0,
            error_message: None,
        }
    }
}

/// Point-in-time health report for one resilient client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub client: String,
    pub total_calls: u64,
    pub total_errors: u64,
    /// Calls refused by the open breaker. Not counted in `total_calls`.
    pub rejected_calls: u64,
    pub last_latency_ms: Option<u64>,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub throughput: u64,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    pub sync: SyncStatus,
}

#[derive(Debug, Default)]
struct Counters {
    total_calls: u64,
    total_errors: u64,
    rejected_calls: u64,
    latencies: VecDeque<u64>,
    sync: SyncStatus,
}

/// Per-call bookkeeping. One `record_call` per logical call, however many
/// attempts it took.
#[derive(Debug)]
pub(crate) struct MetricsRecorder {
    window: usize,
    counters: Mutex<Counters>,
}

impl MetricsRecorder {
    pub(crate) fn new(window: usize) -> Self {
        MetricsRecorder {
            window: window.max(1),
            counters: Mutex::new(Counters::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn record_call(&self, latency: Duration, retries: u32, error: Option<String>) {
        let now = OffsetDateTime::now_utc();
        let mut c = self.lock();
        c.total_calls += 1;
        c.latencies.push_back(latency.as_millis() as u64);
        while c.latencies.len() > self.window {
            c.latencies.pop_front();
        }
        c.sync.retries = retries;
        match error {
            None => {
                c.sync.status = SyncState::Success;
                c.sync.last_success_at = Some(now);
                c.sync.error_message = None;
            }
            Some(message) => {
                c.total_errors += 1;
                c.sync.status = SyncState::Error;
                c.sync.last_error_at = Some(now);
                c.sync.error_message = Some(message);
            }
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.lock().rejected_calls += 1;
    }

    pub(crate) fn mark_retrying(&self, retry: u32) {
        let mut c = self.lock();
        c.sync.status = SyncState::Retrying;
        c.sync.retries = retry;
    }

    pub(crate) fn snapshot(
        &self,
        client: &str,
        circuit: CircuitState,
        consecutive_failures: u32,
    ) -> HealthMetrics {
        let c = self.lock();
        let avg_latency_ms = if c.latencies.is_empty() {
            0.0
        } else {
            c.latencies.iter().sum::<u64>() as f64 / c.latencies.len() as f64
        };
        let error_rate = if c.total_calls == 0 {
            0.0
        } else {
            c.total_errors as f64 / c.total_calls as f64
        };
        HealthMetrics {
            client: client.to_string(),
            total_calls: c.total_calls,
            total_errors: c.total_errors,
            rejected_calls: c.rejected_calls,
            last_latency_ms: c.latencies.back().copied(),
            avg_latency_ms,
            error_rate,
            throughput: c.total_calls,
            circuit,
            consecutive_failures,
            sync: c.sync.clone(),
        }
    }
}
