use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The breaker is closed.
    Normal,
    /// The cooldown has passed and this call decides whether the breaker
    /// closes again.
    Probe,
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open { until: Instant },
    /// A probe is in flight. A probe that never reports back (its future
    /// was dropped) stops blocking admissions after one cooldown.
    Probing { since: Instant },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    consecutive_failures: u32,
}

/// Consecutive-failure circuit breaker on the monotonic tokio clock.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                consecutive_failures: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether a call may run. `Err` carries how long until the next
    /// probe is allowed.
    pub fn admit(&self) -> Result<Admission, Duration> {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.phase {
            Phase::Closed => Ok(Admission::Normal),
            Phase::Open { until } if now < until => Err(until - now),
            Phase::Probing { since } if now < since + self.cooldown => Err(Duration::ZERO),
            Phase::Open { .. } | Phase::Probing { .. } => {
                inner.phase = Phase::Probing { since: now };
                Ok(Admission::Probe)
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.phase = Phase::Closed;
        inner.consecutive_failures = 0;
    }

    /// Count a failed call. Returns true if this failure opened the breaker.
    pub fn record_failure(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let trips = match inner.phase {
            Phase::Probing { .. } => true,
            Phase::Closed => inner.consecutive_failures >= self.threshold,
            Phase::Open { .. } => false,
        };
        if trips {
            inner.phase = Phase::Open {
                until: now + self.cooldown,
            };
        }
        trips
    }

    pub fn state(&self) -> CircuitState {
        let now = Instant::now();
        match self.lock().phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { until } if now < until => CircuitState::Open,
            Phase::Open { .. } | Phase::Probing { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn opens_at_threshold() {
        let b = breaker();
        assert!(!b.record_failure());
        assert!(!b.record_failure());
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.record_failure());
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.admit().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_count() {
        let b = breaker();
        b.record_failure();
        b.record_failure();
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
        b.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn single_probe_after_cooldown() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure();
        }
        let wait = b.admit().unwrap_err();
        assert_eq!(wait, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(b.state(), CircuitState::HalfOpen);
        assert_eq!(b.admit(), Ok(Admission::Probe));
        // Second caller while the probe is in flight.
        assert!(b.admit().is_err());

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.admit(), Ok(Admission::Normal));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_restarts_cooldown() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(b.admit(), Ok(Admission::Probe));
        assert!(b.record_failure());
        assert_eq!(b.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(b.admit().is_err());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(b.admit(), Ok(Admission::Probe));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_probe_expires() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(b.admit(), Ok(Admission::Probe));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(b.admit(), Ok(Admission::Probe));
    }
}
