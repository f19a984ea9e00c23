//! Resilient wrapper for remote operations.
//!
//! Every remote call goes through a [`ResilientClient`]: the circuit breaker
//! decides whether the call may run at all, the retry policy re-runs a
//! failing operation with exponential backoff, and the metrics recorder
//! counts the call exactly once however many attempts it took.

mod breaker;
mod metrics;
mod retry;

use std::fmt;
use std::future::Future;

use safekeep_core::SafekeepError;
use tokio::time::Instant;

use crate::config::ResilienceConfig;

pub use breaker::{Admission, CircuitBreaker, CircuitState};
pub use metrics::{HealthMetrics, SyncState, SyncStatus};
pub use retry::{retry_with_backoff, Attempted, RetryPolicy};

use metrics::MetricsRecorder;

/// Why a resilient call did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("circuit open for {client}, retry in {retry_after_ms} ms")]
    CircuitOpen { client: String, retry_after_ms: u64 },

    /// Every attempt failed; this is the last attempt's error.
    #[error("{0}")]
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }
}

impl<E: fmt::Display> CallError<E> {
    /// Fold into the engine error taxonomy, mapping the operation's own
    /// error through `f`.
    pub fn into_safekeep(self, f: impl FnOnce(E) -> SafekeepError) -> SafekeepError {
        match self {
            CallError::CircuitOpen {
                client,
                retry_after_ms,
            } => SafekeepError::CircuitOpen {
                client,
                retry_after_ms,
            },
            CallError::Failed(e) => f(e),
        }
    }
}

pub struct ResilientClient {
    name: String,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    metrics: MetricsRecorder,
}

impl ResilientClient {
    pub fn new(name: impl Into<String>, config: &ResilienceConfig) -> Self {
        ResilientClient {
            name: name.into(),
            policy: RetryPolicy::from_config(config),
            breaker: CircuitBreaker::new(config.failure_threshold, config.cooldown()),
            metrics: MetricsRecorder::new(config.latency_window),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `op` under the breaker with retries.
    ///
    /// While the breaker is open the call fails immediately with
    /// [`CallError::CircuitOpen`] and `op` is never invoked. Otherwise `op`
    /// runs up to `1 + max_retries` times; a call that exhausts its retries
    /// counts as one breaker failure.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let admission = match self.breaker.admit() {
            Ok(admission) => admission,
            Err(retry_after) => {
                self.metrics.record_rejected();
                tracing::warn!(client = %self.name, "circuit open, failing fast");
                return Err(CallError::CircuitOpen {
                    client: self.name.clone(),
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }
        };
        if admission == Admission::Probe {
            tracing::info!(client = %self.name, "cooldown elapsed, probing remote");
        }

        let started = Instant::now();
        let on_retry = |retry: u32| self.metrics.mark_retrying(retry);
        let attempted = retry_with_backoff(&self.policy, &self.name, op, &on_retry).await;
        let latency = started.elapsed();
        let retries = attempted.attempts.saturating_sub(1);

        match attempted.result {
            Ok(value) => {
                self.breaker.record_success();
                self.metrics.record_call(latency, retries, None);
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                if self.breaker.record_failure() {
                    tracing::error!(
                        client = %self.name,
                        failures = self.breaker.consecutive_failures(),
                        "circuit breaker opened"
                    );
                }
                self.metrics.record_call(latency, retries, Some(message));
                Err(CallError::Failed(e))
            }
        }
    }

    pub fn health_metrics(&self) -> HealthMetrics {
        self.metrics.snapshot(
            &self.name,
            self.breaker.state(),
            self.breaker.consecutive_failures(),
        )
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}
