use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::ResilienceConfig;

/// Exponential backoff with additive jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Backoff plus a uniformly drawn jitter in `0..=max_jitter`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let jitter_ms = {
            let max = self.max_jitter.as_millis() as u64;
            rand::thread_rng().gen_range(0..=max)
        };
        self.backoff(retry) + Duration::from_millis(jitter_ms)
    }

    /// Upper bound on the time spent sleeping across all retries.
    pub fn max_total_wait(&self) -> Duration {
        (1..=self.max_retries)
            .map(|r| self.backoff(r) + self.max_jitter)
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&ResilienceConfig::default())
    }
}

/// Result of [`retry_with_backoff`] with the number of attempts made.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds or `policy.max_retries` retries are spent.
///
/// A permanently failing operation runs `1 + max_retries` times and the
/// last error is returned. `on_retry` is called with the retry number before
/// each backoff sleep.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    on_retry: &(dyn Fn(u32) + Send + Sync),
) -> Attempted<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) => {
                tracing::warn!(client = label, attempt, error = %e, "remote attempt failed");
                if attempt > policy.max_retries {
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                on_retry(attempt);
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_retry_hook(_: u32) {}

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(800));
        assert_eq!(p.backoff(2), Duration::from_millis(1600));
        assert_eq!(p.backoff(3), Duration::from_millis(3200));
    }

    #[test]
    fn jitter_stays_in_range() {
        let p = RetryPolicy::default();
        for _ in 0..200 {
            let d = p.delay_for(2);
            assert!(d >= Duration::from_millis(1600));
            assert!(d <= Duration::from_millis(1800));
        }
    }

    #[test]
    fn total_wait_is_bounded() {
        // 1000 + 1800 + 3400
        assert_eq!(RetryPolicy::default().max_total_wait(), Duration::from_millis(6200));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_runs_four_times() {
        let calls = AtomicU32::new(0);
        let out: Attempted<(), String> = retry_with_backoff(
            &RetryPolicy::default(),
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            },
            &no_retry_hook,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(out.attempts, 4);
        assert_eq!(out.result.unwrap_err(), "down");
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_midway() {
        let calls = AtomicU32::new(0);
        let retries = AtomicU32::new(0);
        let out = retry_with_backoff(
            &RetryPolicy::default(),
            "test",
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("fail {n}"))
                    } else {
                        Ok(n)
                    }
                }
            },
            &|_| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;
        assert_eq!(out.result.unwrap(), 2);
        assert_eq!(out.attempts, 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }
}
